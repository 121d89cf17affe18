//! Table output formatting

use tabled::{
    Table, Tabled,
    builder::Builder,
    settings::{Alignment, Modify, Style, object::Rows},
};

/// Format rows as a table
pub fn format_table<T: Tabled>(data: &[T]) -> String {
    if data.is_empty() {
        return "No results found.".to_string();
    }

    let mut table = Table::new(data);
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));

    table.to_string()
}

/// Format label/value pairs as a borderless two-column listing
pub fn format_details(rows: &[(&str, String)]) -> String {
    let mut builder = Builder::default();
    for (label, value) in rows {
        builder.push_record([format!("{}:", label), value.clone()]);
    }
    let mut table = builder.build();
    table.with(Style::blank());
    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Tabled)]
    struct AvatarRow {
        #[tabled(rename = "AVATAR ID")]
        id: String,
        #[tabled(rename = "NAME")]
        name: String,
    }

    #[test]
    fn test_format_table_empty() {
        let items: Vec<AvatarRow> = vec![];
        assert_eq!(format_table(&items), "No results found.");
    }

    #[test]
    fn test_format_table_rows() {
        let items = vec![
            AvatarRow {
                id: "av-1".to_string(),
                name: "mika".to_string(),
            },
            AvatarRow {
                id: "av-2".to_string(),
                name: "sora".to_string(),
            },
        ];

        let result = format_table(&items);

        assert!(result.contains("AVATAR ID"));
        assert!(result.contains("av-1"));
        assert!(result.contains("sora"));
        // Rounded style corners
        assert!(result.contains("╭"));
        assert!(result.contains("╰"));
    }

    #[test]
    fn test_format_details() {
        let result = format_details(&[
            ("User", "mika".to_string()),
            ("Registrations left", "3".to_string()),
        ]);
        assert!(result.contains("User:"));
        assert!(result.contains("Registrations left:"));
        assert!(result.contains("3"));
        assert!(!result.contains("╭"));
    }
}
