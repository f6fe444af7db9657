// src/core/output/format.rs
use std::io::{self, Write};
use serde::Serialize;

use crate::config::OutputFormat;
use crate::core::call_graph::OutputRecord;

/// Encoding of records inside one output file
pub trait RecordFormat {
    /// Written once when a file is opened
    fn begin(&self, out: &mut dyn Write) -> io::Result<()>;

    /// Written for each record; `position` is the index within the file
    fn record(&self, out: &mut dyn Write, record: &OutputRecord, position: usize) -> io::Result<()>;

    /// Written once before a file is closed
    fn end(&self, out: &mut dyn Write) -> io::Result<()>;
}

pub fn create_format(format: OutputFormat) -> Box<dyn RecordFormat> {
    match format {
        OutputFormat::Json => Box::new(JsonFormat),
        OutputFormat::Tsv => Box::new(TsvFormat),
    }
}

/// `[{"caller":..,"callInstruction":..,"actualTarget":..,"contexts":[..]},..]`
pub struct JsonFormat;

#[derive(Serialize)]
struct JsonRecord<'a> {
    caller: &'a str,
    #[serde(rename = "callInstruction")]
    call_instruction: &'a str,
    #[serde(rename = "actualTarget")]
    actual_target: &'a str,
    contexts: &'a [String],
}

impl RecordFormat for JsonFormat {
    fn begin(&self, out: &mut dyn Write) -> io::Result<()> {
        out.write_all(b"[")
    }

    fn record(&self, out: &mut dyn Write, record: &OutputRecord, position: usize) -> io::Result<()> {
        if position > 0 {
            out.write_all(b",")?;
        }
        let json = JsonRecord {
            caller: &record.caller,
            call_instruction: &record.call_site,
            actual_target: &record.target,
            contexts: &record.target_context,
        };
        serde_json::to_writer(&mut *out, &json)?;
        Ok(())
    }

    fn end(&self, out: &mut dyn Write) -> io::Result<()> {
        out.write_all(b"]")
    }
}

pub const TSV_HEADER: &str = "caller\tcallsite\tcalling_context\ttarget\ttarget_context\n";

/// Header row plus one tab-separated row per record
pub struct TsvFormat;

/// Replace characters that would break the row structure
pub fn sanitize_field(field: &str) -> String {
    field.replace(['\t', '\n', '\r'], " ")
}

fn render_context(frames: &[String]) -> String {
    let joined: Vec<String> = frames.iter().map(|f| sanitize_field(f)).collect();
    format!("[{}]", joined.join(", "))
}

impl RecordFormat for TsvFormat {
    fn begin(&self, out: &mut dyn Write) -> io::Result<()> {
        out.write_all(TSV_HEADER.as_bytes())
    }

    fn record(&self, out: &mut dyn Write, record: &OutputRecord, _position: usize) -> io::Result<()> {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}",
            sanitize_field(&record.caller),
            sanitize_field(&record.call_site),
            render_context(&record.caller_context),
            sanitize_field(&record.target),
            render_context(&record.target_context)
        )
    }

    fn end(&self, _out: &mut dyn Write) -> io::Result<()> {
        Ok(())
    }
}
