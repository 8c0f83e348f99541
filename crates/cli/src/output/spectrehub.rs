//! SpectreHub upload envelope

use std::io::Write;

use serde::Serialize;

use spectre_lib::ReportData;

use crate::errors::CliError;

const ENVELOPE_VERSION: &str = "1";

#[derive(Serialize)]
struct Envelope<'a> {
    version: &'static str,
    tool: ToolInfo<'a>,
    report: &'a ReportData,
}

#[derive(Serialize)]
struct ToolInfo<'a> {
    name: &'a str,
    version: &'a str,
}

pub fn write<W: Write>(data: &ReportData, mut w: W) -> Result<(), CliError> {
    let envelope = Envelope {
        version: ENVELOPE_VERSION,
        tool: ToolInfo {
            name: &data.tool,
            version: &data.version,
        },
        report: data,
    };
    serde_json::to_writer_pretty(&mut w, &envelope)?;
    writeln!(w)?;
    Ok(())
}
