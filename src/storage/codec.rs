//! Identifier codec
//!
//! Uids use hyphens, which are not legal in bare SQL identifiers. The codec
//! swaps `-` for `_` and back. It is only invertible because uids are
//! restricted to `[0-9a-z-]`: a uid may never contain `_`.

use crate::error::{StoreError, StoreResult};

/// Prefix of every descriptor table
pub const TABLE_PREFIX: &str = "desc_";

/// Extension of every storage unit file
pub const UNIT_EXTENSION: &str = "sqlite";

/// Encode a uid into an identifier
pub fn encode(uid: &str) -> String {
    uid.replace('-', "_")
}

/// Decode an identifier back into a uid
pub fn decode(ident: &str) -> String {
    ident.replace('_', "-")
}

/// Check a uid against the `[0-9a-z-]+` alphabet
pub fn validate_uid(uid: &str) -> StoreResult<()> {
    if uid.is_empty() {
        return Err(StoreError::InvalidIdentifier("uid is empty".to_string()));
    }
    if let Some(c) = uid.chars().find(|c| !is_uid_char(*c)) {
        return Err(StoreError::InvalidIdentifier(format!(
            "uid '{}' contains '{}'; allowed: 0-9, a-z, '-'",
            uid, c
        )));
    }
    Ok(())
}

fn is_uid_char(c: char) -> bool {
    c.is_ascii_digit() || c.is_ascii_lowercase() || c == '-'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_digit() || c.is_ascii_lowercase() || c == '_'
}

/// Table holding the events of a descriptor
pub fn table_name(descriptor_uid: &str) -> String {
    format!("{}{}", TABLE_PREFIX, encode(descriptor_uid))
}

/// Descriptor uid behind a table name, if it follows the convention
pub fn parse_table_name(table: &str) -> Option<String> {
    let ident = table.strip_prefix(TABLE_PREFIX)?;
    if ident.is_empty() || !ident.chars().all(is_ident_char) {
        return None;
    }
    Some(decode(ident))
}

/// File name of the storage unit for a run
pub fn unit_file_name(run_uid: &str) -> String {
    format!("{}.{}", encode(run_uid), UNIT_EXTENSION)
}

/// Run uid behind a unit file name, if it follows the convention
pub fn parse_unit_file_name(file_name: &str) -> Option<String> {
    let ident = file_name.strip_suffix(UNIT_EXTENSION)?.strip_suffix('.')?;
    if ident.is_empty() || !ident.chars().all(is_ident_char) {
        return None;
    }
    Some(decode(ident))
}

/// Quote an identifier for SQL
pub fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let uid = "5f3c2a10-7b1e-4c2d-9e8f-0a1b2c3d4e5f";
        let ident = encode(uid);
        assert_eq!(ident, "5f3c2a10_7b1e_4c2d_9e8f_0a1b2c3d4e5f");
        assert!(!ident.contains('-'));
        assert_eq!(decode(&ident), uid);
    }

    #[test]
    fn test_decode_inverts_encode_for_valid_uids() {
        for uid in ["a", "r1", "run-1", "--", "0-a-9-z", "abc-def-"] {
            validate_uid(uid).unwrap();
            assert_eq!(decode(&encode(uid)), uid);
        }
    }

    #[test]
    fn test_validate_uid_rejects_collision_prone_names() {
        assert!(validate_uid("run_1").is_err());
        assert!(validate_uid("Run-1").is_err());
        assert!(validate_uid("run 1").is_err());
        assert!(validate_uid("").is_err());
        assert!(validate_uid("run\"1").is_err());
    }

    #[test]
    fn test_table_name_round_trip() {
        let table = table_name("d-1");
        assert_eq!(table, "desc_d_1");
        assert_eq!(parse_table_name(&table), Some("d-1".to_string()));
    }

    #[test]
    fn test_parse_table_name_skips_foreign_tables() {
        assert_eq!(parse_table_name("sqlite_sequence"), None);
        assert_eq!(parse_table_name("desc_"), None);
        assert_eq!(parse_table_name("desc_Bad"), None);
        assert_eq!(parse_table_name("events"), None);
    }

    #[test]
    fn test_unit_file_name_round_trip() {
        let name = unit_file_name("r-1");
        assert_eq!(name, "r_1.sqlite");
        assert_eq!(parse_unit_file_name(&name), Some("r-1".to_string()));
    }

    #[test]
    fn test_parse_unit_file_name_skips_unrecognized() {
        assert_eq!(parse_unit_file_name("run_starts.json"), None);
        assert_eq!(parse_unit_file_name(".sqlite"), None);
        assert_eq!(parse_unit_file_name("r1.sqlite-journal"), None);
        assert_eq!(parse_unit_file_name("R1.sqlite"), None);
        assert_eq!(parse_unit_file_name("r1sqlite"), None);
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("data_x"), "\"data_x\"");
        assert_eq!(quote("a\"b"), "\"a\"\"b\"");
    }
}
