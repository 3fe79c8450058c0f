use regex::Regex;
use std::sync::LazyLock;

/// Site identifier, e.g. `T1_00001`. Case-sensitive.
static SITE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"T[1-7]_\d{5}").expect("valid site id pattern"));

/// Site identifier followed by a `DDD_DDDDDDD` excavation batch.
static SECONDARY_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"T[1-7]_\d{5}_(\d{3}_\d{7})").expect("valid secondary id pattern")
});

/// Site folder names: identifier at the start, any case.
static SITE_ROOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^T[1-7]_\d{5}").expect("valid site root pattern"));

/// Extract the leftmost site identifier from a file or folder name
/// Pure function
pub fn extract_site_id(name: &str) -> Option<&str> {
    SITE_ID.find(name).map(|m| m.as_str())
}

/// Extract the excavation batch (`001_0000007` in `T2_00042_001_0000007.jpg`)
/// Pure function, only used for summary aggregation
pub fn extract_secondary_id(name: &str) -> Option<&str> {
    SECONDARY_ID
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Identifier of a site folder, normalized to upper case.
///
/// Returns `None` when the folder name does not start with the pattern.
pub fn site_root_id(dir_name: &str) -> Option<String> {
    SITE_ROOT
        .find(dir_name)
        .map(|m| m.as_str().to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_site_id_exact_token() {
        for n in 1..=7 {
            let name = format!("T{}_12345", n);
            assert_eq!(extract_site_id(&name), Some(name.as_str()));
        }
    }

    #[test]
    fn test_extract_site_id_embedded_in_file_name() {
        assert_eq!(extract_site_id("foto_T3_00017_norte.jpg"), Some("T3_00017"));
    }

    #[test]
    fn test_extract_site_id_leftmost_wins() {
        assert_eq!(extract_site_id("T1_00001-T2_00002.jpg"), Some("T1_00001"));
    }

    #[test]
    fn test_extract_site_id_no_match() {
        assert_eq!(extract_site_id("T8_00001.jpg"), None);
        assert_eq!(extract_site_id("T0_00001.jpg"), None);
        assert_eq!(extract_site_id("T1_0001.jpg"), None);
        assert_eq!(extract_site_id("t1_00001.jpg"), None);
        assert_eq!(extract_site_id("IMG_0001.jpg"), None);
    }

    #[test]
    fn test_extract_site_id_takes_first_five_digits() {
        assert_eq!(extract_site_id("T1_0000123.jpg"), Some("T1_00001"));
    }

    #[test]
    fn test_extract_secondary_id() {
        let name = "T2_00042_001_0000007.jpg";
        assert_eq!(extract_site_id(name), Some("T2_00042"));
        assert_eq!(extract_secondary_id(name), Some("001_0000007"));
    }

    #[test]
    fn test_extract_secondary_id_absent() {
        assert_eq!(extract_secondary_id("T2_00042.jpg"), None);
        assert_eq!(extract_secondary_id("T2_00042_01_0000007.jpg"), None);
        assert_eq!(extract_secondary_id("001_0000007.jpg"), None);
    }

    #[test]
    fn test_site_root_id_case_insensitive_and_anchored() {
        assert_eq!(site_root_id("t4_00100 Cerro Alto"), Some("T4_00100".to_string()));
        assert_eq!(site_root_id("T4_00100"), Some("T4_00100".to_string()));
        assert_eq!(site_root_id("Old T4_00100"), None);
        assert_eq!(site_root_id("reportes"), None);
    }
}
