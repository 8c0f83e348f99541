//! spectre/v1 JSON envelope

use std::io::Write;

use serde::Serialize;

use spectre_lib::ReportData;

use crate::errors::CliError;

const SCHEMA: &str = "spectre/v1";

#[derive(Serialize)]
struct Envelope<'a> {
    schema: &'static str,
    #[serde(flatten)]
    report: &'a ReportData,
}

pub fn write<W: Write>(data: &ReportData, mut w: W) -> Result<(), CliError> {
    let envelope = Envelope {
        schema: SCHEMA,
        report: data,
    };
    serde_json::to_writer_pretty(&mut w, &envelope)?;
    writeln!(w)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectre_lib::analyzer::AnalysisResult;
    use spectre_lib::Summary;

    #[test]
    fn test_envelope_schema_and_round_trip() {
        let analysis = AnalysisResult {
            findings: Vec::new(),
            summary: Summary::default(),
            errors: Vec::new(),
        };
        let data =
            ReportData::build("gcpspectre", "0.0.0-test", &["demo".to_string()], 7, 90, 1.0, analysis);

        let mut buf = Vec::new();
        write(&data, &mut buf).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();

        assert_eq!(value["schema"], "spectre/v1");
        assert_eq!(value["tool"], "gcpspectre");
        assert_eq!(value["target"]["type"], "gcp-projects");

        // The envelope contains the full ReportData and deserializes back.
        let report: ReportData =
            serde_json::from_value(value.clone()).unwrap();
        assert_eq!(report.target, data.target);
    }
}
