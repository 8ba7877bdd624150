// Container variants and how to recognize them.

use std::io::Cursor;

use crate::error::CodecError;

/// Compound File Binary signature (legacy .xls lives inside one).
pub const CFB_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Local file header signature of a zip archive (.xlsx).
pub const ZIP_MAGIC: [u8; 4] = [b'P', b'K', 0x03, 0x04];

/// Extensions accepted for upload and modification.
pub const SUPPORTED_EXTENSIONS: [&str; 2] = [".xls", ".xlsx"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpreadsheetFormat {
    /// Excel 97-2003 binary workbook (BIFF8 in a compound file)
    Xls,
    /// Office Open XML workbook
    #[default]
    Xlsx,
}

impl SpreadsheetFormat {
    /// Format requested by a file name's extension (case-insensitive).
    pub fn from_file_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".xlsx") {
            Some(SpreadsheetFormat::Xlsx)
        } else if lower.ends_with(".xls") {
            Some(SpreadsheetFormat::Xls)
        } else {
            None
        }
    }

    /// Format to write for a stored file: the legacy container only when
    /// the name asks for it.
    pub fn for_output(name: &str) -> Self {
        Self::from_file_name(name).unwrap_or_default()
    }

    /// Identify the container from its leading bytes and structure.
    pub fn sniff(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.starts_with(&CFB_MAGIC) {
            return Ok(SpreadsheetFormat::Xls);
        }

        if bytes.starts_with(&ZIP_MAGIC) {
            let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
                .map_err(|e| CodecError::UnsupportedFormat(format!("unreadable zip archive: {e}")))?;
            if archive.by_name("xl/workbook.xml").is_ok() {
                return Ok(SpreadsheetFormat::Xlsx);
            }
            return Err(CodecError::UnsupportedFormat(
                "zip archive is not a spreadsheet workbook".to_string(),
            ));
        }

        Err(CodecError::UnsupportedFormat(
            "not a recognized spreadsheet container".to_string(),
        ))
    }

    pub fn extension(&self) -> &'static str {
        match self {
            SpreadsheetFormat::Xls => "xls",
            SpreadsheetFormat::Xlsx => "xlsx",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            SpreadsheetFormat::Xls => "application/vnd.ms-excel",
            SpreadsheetFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

/// True when the name ends in one of `SUPPORTED_EXTENSIONS`.
pub fn has_supported_extension(name: &str) -> bool {
    SpreadsheetFormat::from_file_name(name).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_file_name() {
        assert_eq!(SpreadsheetFormat::from_file_name("data.xlsx"), Some(SpreadsheetFormat::Xlsx));
        assert_eq!(SpreadsheetFormat::from_file_name("DATA.XLS"), Some(SpreadsheetFormat::Xls));
        assert_eq!(SpreadsheetFormat::from_file_name("data.csv"), None);
        assert_eq!(SpreadsheetFormat::from_file_name("xlsx"), None);
    }

    #[test]
    fn test_for_output_defaults_to_xlsx() {
        assert_eq!(SpreadsheetFormat::for_output("old.xls"), SpreadsheetFormat::Xls);
        assert_eq!(SpreadsheetFormat::for_output("new.xlsx"), SpreadsheetFormat::Xlsx);
        assert_eq!(SpreadsheetFormat::for_output("noext"), SpreadsheetFormat::Xlsx);
    }

    #[test]
    fn test_sniff_rejects_garbage() {
        assert!(matches!(
            SpreadsheetFormat::sniff(b"name,qty\nbolt,5\n"),
            Err(CodecError::UnsupportedFormat(_))
        ));
        assert!(matches!(SpreadsheetFormat::sniff(&[]), Err(CodecError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_sniff_rejects_truncated_zip() {
        let mut bytes = ZIP_MAGIC.to_vec();
        bytes.extend_from_slice(&[0u8; 16]);
        assert!(matches!(SpreadsheetFormat::sniff(&bytes), Err(CodecError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_sniff_cfb_magic() {
        let mut bytes = CFB_MAGIC.to_vec();
        bytes.extend_from_slice(&[0u8; 504]);
        assert_eq!(SpreadsheetFormat::sniff(&bytes).unwrap(), SpreadsheetFormat::Xls);
    }

    #[test]
    fn test_has_supported_extension() {
        assert!(has_supported_extension("report.xlsx"));
        assert!(has_supported_extension("report.Xls"));
        assert!(!has_supported_extension("report.xlsm"));
        assert!(!has_supported_extension("report.pdf"));
    }
}
