use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use udo_session::value::encode_le;

use crate::cmd::{open_session, parse_hex_bytes, parse_int, LinkArgs, WriteArgs};
use crate::exit::{udo_error, CliError, CliResult, SUCCESS};
use crate::output::{hex_string, OutputFormat};

#[derive(Serialize)]
struct WriteOutput {
    index: String,
    offset: u32,
    len: usize,
    hex: String,
    written: bool,
}

pub fn run(args: WriteArgs, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let data = payload(&args)?;

    let mut session = open_session(&args.target, link)?;
    let result = session.write_blob(args.index, args.offset, &data);
    session.close();
    result.map_err(|err| udo_error("write failed", err))?;

    let out = WriteOutput {
        index: format!("{:04X}", args.index),
        offset: args.offset,
        len: data.len(),
        hex: hex_string(&data),
        written: true,
    };
    print_write(&out, format);
    Ok(SUCCESS)
}

fn payload(args: &WriteArgs) -> CliResult<Vec<u8>> {
    match (&args.hex, &args.value) {
        (Some(hex), _) => parse_hex_bytes(hex),
        (None, Some(value)) => Ok(encode_le(parse_int(value, args.width)?, args.width)),
        (None, None) => Err(CliError::usage("either a value or --hex is required")),
    }
}

fn print_write(out: &WriteOutput, format: OutputFormat) {
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
                .set_header(vec!["INDEX", "OFFSET", "LEN", "DATA"])
                .add_row(vec![
                    out.index.clone(),
                    out.offset.to_string(),
                    out.len.to_string(),
                    out.hex.clone(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "wrote {} byte(s) to {}+{}: {}",
                out.len, out.index, out.offset, out.hex
            );
        }
        OutputFormat::Raw => {}
    }
}
