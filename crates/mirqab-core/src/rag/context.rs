//! Context assembly: render retrieved reports into the text block the
//! generator is conditioned on.

use std::fmt::Write;

use crate::models::DetectionReport;

/// Sentinel rendered instead of an empty block, so the generator can
/// apply its empty-context refusal rule rather than seeing a malformed
/// prompt.
pub const EMPTY_CONTEXT: &str = "No detection reports found.";

/// Render the retrieved reports as a plain-text context block: a header
/// with the total count, then one numbered paragraph per report.
/// Numbering is 1-based and independent of the report ids. The output is
/// a pure function of the input list.
pub fn assemble_context(reports: &[DetectionReport]) -> String {
    if reports.is_empty() {
        return EMPTY_CONTEXT.to_string();
    }

    let mut block = format!("Detection Reports (Total: {}):\n", reports.len());

    for (i, report) in reports.iter().enumerate() {
        // write! into a String cannot fail.
        let _ = write!(
            block,
            "\nReport #{}:\n\
             - Report ID: {}\n\
             - Timestamp: {}\n\
             - Device: {}\n\
             - Location: Latitude {:.6}, Longitude {:.6}\n\
             - Soldier Count: {}\n\
             - Environment: {}\n\
             - Attire & Camouflage: {}\n\
             - Equipment: {}\n",
            i + 1,
            report.report_id,
            report.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            report.source_device_id,
            report.location.latitude,
            report.location.longitude,
            report.soldier_count,
            report.environment,
            report.attire_and_camouflage,
            report.equipment,
        );
    }

    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeoPoint;
    use chrono::{TimeZone, Utc};

    fn report(id: &str) -> DetectionReport {
        DetectionReport {
            report_id: id.to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 10, 24, 6, 15, 0).unwrap(),
            location: GeoPoint::new(24.713552, 46.675297),
            soldier_count: 3,
            environment: "dense woodland".to_string(),
            attire_and_camouflage: "Woodland pattern uniform".to_string(),
            equipment: "Rifles, backpacks".to_string(),
            source_device_id: "Pi-001".to_string(),
            image_snapshot_url: String::new(),
            segmented_image_url: String::new(),
            ai_summary: String::new(),
        }
    }

    #[test]
    fn test_empty_input_renders_sentinel() {
        assert_eq!(assemble_context(&[]), EMPTY_CONTEXT);
        assert!(!assemble_context(&[]).is_empty());
    }

    #[test]
    fn test_header_states_total_count() {
        let block = assemble_context(&[report("MIR-20251024-0001"), report("MIR-20251024-0002")]);
        assert!(block.starts_with("Detection Reports (Total: 2):"));
    }

    #[test]
    fn test_paragraphs_numbered_independently_of_report_id() {
        let block = assemble_context(&[report("MIR-20251024-0007")]);
        assert!(block.contains("Report #1:"));
        assert!(block.contains("- Report ID: MIR-20251024-0007"));
    }

    #[test]
    fn test_location_has_six_decimal_places() {
        let block = assemble_context(&[report("MIR-20251024-0001")]);
        assert!(block.contains("Latitude 24.713552, Longitude 46.675297"));
    }

    #[test]
    fn test_rendering_is_idempotent() {
        let reports = vec![report("MIR-20251024-0001"), report("MIR-20251024-0002")];
        assert_eq!(assemble_context(&reports), assemble_context(&reports));
    }

    #[test]
    fn test_all_descriptive_fields_present() {
        let block = assemble_context(&[report("MIR-20251024-0001")]);
        assert!(block.contains("- Device: Pi-001"));
        assert!(block.contains("- Soldier Count: 3"));
        assert!(block.contains("- Environment: dense woodland"));
        assert!(block.contains("- Attire & Camouflage: Woodland pattern uniform"));
        assert!(block.contains("- Equipment: Rifles, backpacks"));
    }
}
