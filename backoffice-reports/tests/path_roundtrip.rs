use backoffice_reports::{DELIMITER, PathError, parse_report_file_name, tool_report_path};
use proptest::prelude::*;

fn identifier() -> impl Strategy<Value = String> {
    "[A-Za-z0-9.+-]{1,24}"
}

proptest! {
    #[test]
    fn report_path_splits_back_into_tool_and_version(
        tool in identifier(),
        version in identifier(),
        id in "[a-z-]{1,16}",
    ) {
        let path = tool_report_path("reports", &id, "1", &tool, &version).unwrap();
        let file_name = path.rsplit('/').next().unwrap();
        let parsed = parse_report_file_name(file_name).unwrap();
        prop_assert_eq!(parsed.name, tool);
        prop_assert_eq!(parsed.version, version);
    }

    #[test]
    fn delimiter_anywhere_is_rejected(
        head in "[a-z0-9.]{0,8}",
        tail in "[a-z0-9.]{0,8}",
        in_version in any::<bool>(),
    ) {
        let bad = format!("{head}{DELIMITER}{tail}");
        let result = if in_version {
            tool_report_path("reports", "id", "1", "tool", &bad)
        } else {
            tool_report_path("reports", "id", "1", &bad, "1.0")
        };
        let is_invalid = matches!(result, Err(PathError::InvalidIdentifier { .. }));
        prop_assert!(is_invalid);
    }
}
