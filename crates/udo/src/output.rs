use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Result of a `read` command.
#[derive(Debug, Serialize)]
pub struct ValueOutput {
    pub index: String,
    pub offset: u32,
    pub len: usize,
    /// `u8`, `i16`, ... or `hex` for plain bytes.
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
    pub hex: String,
    #[serde(skip)]
    pub data: Vec<u8>,
}

pub fn print_value(out: &ValueOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["INDEX", "OFFSET", "LEN", "VALUE", "DATA"])
                .add_row(vec![
                    out.index.clone(),
                    out.offset.to_string(),
                    out.len.to_string(),
                    out.value.map(|v| v.to_string()).unwrap_or_default(),
                    out.hex.clone(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => match out.value {
            Some(value) => println!(
                "{}+{} {} = {value} (0x{})",
                out.index,
                out.offset,
                out.kind,
                be_hex(&out.data)
            ),
            None => println!("{}+{} [{}] = {}", out.index, out.offset, out.len, out.hex),
        },
        OutputFormat::Raw => print_raw(&out.data),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// Space separated bytes in wire order: `0F F0 0F 0F`.
pub fn hex_string(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Little-endian bytes shown most significant first.
fn be_hex(data: &[u8]) -> String {
    data.iter().rev().map(|b| format!("{b:02X}")).collect()
}
