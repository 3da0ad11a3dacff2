use std::collections::BTreeMap;

use serde::Serialize;

use crate::interpreter::{BuiltinDoc, Builtins};

/// Output formats for `--generate-docs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    Markdown,
    Json,
}

pub fn render(builtins: &Builtins, format: Format) -> serde_json::Result<String> {
    match format {
        Format::Markdown => Ok(markdown(builtins)),
        Format::Json => json(builtins),
    }
}

fn categories(builtins: &Builtins) -> Vec<&'static str> {
    let mut categories: Vec<&str> = Vec::new();
    for builtin in builtins.iter() {
        if !categories.contains(&builtin.doc.category) {
            categories.push(builtin.doc.category);
        }
    }
    categories
}

/// Renders the builtin reference as Markdown, grouped by category in the
/// order categories first appear.
pub fn markdown(builtins: &Builtins) -> String {
    let mut out = String::from("# Functions\n\n");
    for category in categories(builtins) {
        out.push_str(&format!("## {}\n\n", category));
        for builtin in builtins.iter().filter(|b| b.doc.category == category) {
            let doc = &builtin.doc;
            out.push_str(&format!(
                "### {}\n\n```php\n{}({})\n```\n\n{}\n\nReturns `{}`.\n\n#### Example\n\n```php\n{}\n\n// output: {}\n```\n\n",
                doc.title, builtin.name, doc.args, doc.description, doc.returns, doc.example, doc.output
            ));
        }
    }
    out
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Entry {
    args: &'static str,
    return_value: &'static str,
    example: &'static str,
    output: &'static str,
    description: &'static str,
    title: &'static str,
    category: &'static str,
}

impl From<&BuiltinDoc> for Entry {
    fn from(doc: &BuiltinDoc) -> Self {
        Self {
            args: doc.args,
            return_value: doc.returns,
            example: doc.example,
            output: doc.output,
            description: doc.description,
            title: doc.title,
            category: doc.category,
        }
    }
}

/// Renders the builtin reference as a JSON object keyed by category, then by
/// function name.
pub fn json(builtins: &Builtins) -> serde_json::Result<String> {
    let mut document: BTreeMap<&str, BTreeMap<&str, Entry>> = BTreeMap::new();
    for builtin in builtins.iter() {
        document
            .entry(builtin.doc.category)
            .or_default()
            .insert(builtin.name, Entry::from(&builtin.doc));
    }
    serde_json::to_string_pretty(&document)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_markdown_groups_by_category() {
        let out = markdown(&Builtins::standard());
        assert!(out.starts_with("# Functions\n\n## Array\n\n### Append\n\n```php\nappend(list, value1, value2, ...)\n```"));

        let array = out.find("## Array").unwrap();
        let system = out.find("## System").unwrap();
        let http = out.find("## HTTP").unwrap();
        assert!(array < system && system < http);
        assert_eq!(out.matches("## String\n").count(), 1);
        assert!(out.contains("// output: [0, 1, 2]\n"));
        assert!(out.contains("### Snake Case"));
    }

    #[test]
    fn test_json_keyed_by_category_and_name() {
        let builtins = Builtins::standard();
        let out = render(&builtins, Format::Json).unwrap();
        let document: serde_json::Value = serde_json::from_str(&out).unwrap();

        let range = &document["Array"]["range"];
        assert_eq!(range["output"], "[0, 1, 2]");
        assert_eq!(range["category"], "Array");
        assert_eq!(range["title"], "Range");
        assert!(range.get("returnValue").is_some());
        assert!(range.get("returns").is_none());

        assert!(document["String"]["snake_case"].is_object());
        assert!(document["HTTP"]["http_listen"].is_object());

        let total: usize = document
            .as_object()
            .unwrap()
            .values()
            .map(|functions| functions.as_object().unwrap().len())
            .sum();
        assert_eq!(total, builtins.len());
    }
}
