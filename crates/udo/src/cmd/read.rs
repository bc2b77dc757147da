use udo_session::value::{decode_signed, decode_unsigned};

use crate::cmd::{open_session, LinkArgs, ReadArgs, ValueKind};
use crate::exit::{udo_error, CliError, CliResult, SUCCESS};
use crate::output::{hex_string, print_value, OutputFormat, ValueOutput};

pub fn run(args: ReadArgs, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    if args.kind == ValueKind::Hex && args.len == 0 {
        return Err(CliError::usage("--len must be greater than zero"));
    }

    let mut session = open_session(&args.target, link)?;
    let result = match args.kind.width() {
        Some(width) => session.read(args.index, args.offset, width),
        None => session.read_blob(args.index, args.offset, args.len),
    };
    session.close();
    let data = result.map_err(|err| udo_error("read failed", err))?;

    let out = build_output(&args, data.to_vec());
    print_value(&out, format);
    Ok(SUCCESS)
}

fn build_output(args: &ReadArgs, data: Vec<u8>) -> ValueOutput {
    let value = match args.kind {
        ValueKind::Hex => None,
        kind if kind.is_signed() => Some(i64::from(decode_signed(&data))),
        _ => Some(i64::from(decode_unsigned(&data))),
    };
    ValueOutput {
        index: format!("{:04X}", args.index),
        offset: args.offset,
        len: data.len(),
        kind: args.kind.name(),
        value,
        hex: hex_string(&data),
        data,
    }
}
