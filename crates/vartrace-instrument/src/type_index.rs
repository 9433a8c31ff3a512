//! Declared-type index: a best-effort regex scan of variable declarations.
//!
//! The index maps variable names to the type they were declared with so the
//! code generator can emit casts for read-back statements. It understands
//! declarations of the form `T name`, `T[] name` and `T[,] name` (locals,
//! parameters, `for` initializers and `foreach` variables) where `T` is a
//! C# keyword type or `var`.
//!
//! Known limits:
//! - only the first declarator of `int a = 1, b = 2;` is seen
//! - scoping is ignored; a name declared with two different types anywhere
//!   in the file has no usable cast
//! - `var` is resolved only for `foreach` over a variable of known array
//!   or string type

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use vartrace_core::{ElementType, Rank, ValueType};

use crate::source::CodeView;

const TYPE_KEYWORDS: &str =
    "int|float|double|char|string|var|bool|long|short|byte|decimal|uint|ulong|object";

static DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b({TYPE_KEYWORDS})\s*(\[\s*,?\s*\])?\s+([A-Za-z_]\w*)\s*(=|;|,|\)|\bin\b)"
    ))
    .expect("declaration pattern is valid")
});

static FOREACH_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\bforeach\s*\(\s*({TYPE_KEYWORDS})\s*(\[\s*,?\s*\])?\s+([A-Za-z_]\w*)\s+in\s+([A-Za-z_]\w*)"
    ))
    .expect("foreach pattern is valid")
});

static FOR_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\bfor\s*\(\s*({TYPE_KEYWORDS})\s*(\[\s*,?\s*\])?\s+([A-Za-z_]\w*)"
    ))
    .expect("for pattern is valid")
});

/// One declaration site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub name: String,
    /// Type as written, e.g. `int[]`, `var`, `bool`.
    pub declared_type: String,
    /// Resolved capture type, when it is one the serializer supports.
    pub value_type: Option<ValueType>,
    /// 1-based line of the declaration.
    pub line: usize,
    /// `false` for `foreach` iteration variables.
    pub assignable: bool,
    /// Declared in a `for`/`foreach` header, so scoped to that loop.
    pub loop_header: bool,
}

/// Declarations by variable name, in order of first appearance.
#[derive(Debug, Clone, Default)]
pub struct TypeIndex {
    declarations: IndexMap<String, Vec<Declaration>>,
}

impl TypeIndex {
    /// Scans a whole source file.
    pub fn scan(source: &str) -> Self {
        let lines: Vec<&str> = source.lines().collect();
        Self::scan_lines(&lines)
    }

    pub fn scan_lines(lines: &[&str]) -> Self {
        let view = CodeView::new(lines);
        let mut index = TypeIndex::default();
        for line_idx in 0..view.line_count() {
            let code = view.trimmed(line_idx);
            if code.is_empty() {
                continue;
            }
            index.scan_line(&code, line_idx + 1);
        }
        index
    }

    fn scan_line(&mut self, code: &str, line: usize) {
        let foreach: Vec<(String, String)> = FOREACH_HEADER
            .captures_iter(code)
            .map(|c| (c[3].to_string(), c[4].to_string()))
            .collect();
        let for_locals: Vec<String> = FOR_HEADER
            .captures_iter(code)
            .map(|c| c[3].to_string())
            .collect();

        for caps in DECLARATION.captures_iter(code) {
            let keyword = &caps[1];
            let suffix: String = caps
                .get(2)
                .map(|m| m.as_str().chars().filter(|c| !c.is_whitespace()).collect())
                .unwrap_or_default();
            let name = caps[3].to_string();
            let declared_type = format!("{keyword}{suffix}");
            let iterated = foreach
                .iter()
                .find(|(var, _)| *var == name)
                .map(|(_, collection)| collection.clone());

            let value_type = if keyword == "var" {
                iterated
                    .as_deref()
                    .and_then(|collection| self.element_of(collection))
            } else {
                ValueType::from_type_name(&declared_type).ok()
            };

            let decl = Declaration {
                loop_header: iterated.is_some() || for_locals.contains(&name),
                assignable: iterated.is_none(),
                name: name.clone(),
                declared_type,
                value_type,
                line,
            };
            self.declarations.entry(name).or_default().push(decl);
        }
    }

    /// Element type of iterating over `collection`, when it is known.
    fn element_of(&self, collection: &str) -> Option<ValueType> {
        let ty = self.cast_type(collection)?;
        match (ty.rank, ty.element) {
            (Rank::Vector | Rank::Matrix, element) => Some(ValueType::scalar(element)),
            (Rank::Scalar, ElementType::String) => Some(ValueType::scalar(ElementType::Char)),
            (Rank::Scalar, _) => None,
        }
    }

    /// First declaration of `name`.
    pub fn lookup(&self, name: &str) -> Option<&Declaration> {
        self.declarations.get(name).and_then(|decls| decls.first())
    }

    /// The type to cast read-back values to, if every declaration of `name`
    /// agrees on one supported type.
    pub fn cast_type(&self, name: &str) -> Option<ValueType> {
        let decls = self.declarations.get(name)?;
        let first = decls.first()?.value_type?;
        decls
            .iter()
            .all(|d| d.value_type == Some(first))
            .then_some(first)
    }

    /// `false` if any declaration of `name` is a `foreach` variable; unknown
    /// names are assumed assignable.
    pub fn is_assignable(&self, name: &str) -> bool {
        self.declarations
            .get(name)
            .map_or(true, |decls| decls.iter().all(|d| d.assignable))
    }

    /// Whether `name` is only visible inside the structure spanning
    /// `first..=last` (1-based lines, header to closing brace): it is
    /// declared in that header or body and has no ordinary declaration
    /// before the structure.
    pub fn is_scoped_within(&self, name: &str, first: usize, last: usize) -> bool {
        let Some(decls) = self.declarations.get(name) else {
            return false;
        };
        let inside = decls.iter().any(|d| (first..=last).contains(&d.line));
        let declared_before = decls.iter().any(|d| !d.loop_header && d.line < first);
        inside && !declared_before
    }

    /// `name - type` lines, one per variable (first declaration wins).
    pub fn listing(&self) -> Vec<String> {
        self.declarations
            .values()
            .filter_map(|decls| decls.first())
            .map(|d| format!("{} - {}", d.name, d.declared_type))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROGRAM: &str = r#"using System;
class Program
{
    static int Sum(int[] values, int n)
    {
        int total = 0;
        for (int i = 0; i < n; i++)
            total += values[i];
        return total;
    }

    static void Main(string[] args)
    {
        int[,] grid = new int[2, 2];
        double ratio = 0.5;
        string label = "int fake = 3;";
        bool done = false;
        foreach (var v in values2) { }
        char[] letters = { 'a', 'b' };
        foreach (var c in letters) { }
        foreach (int cell in grid) { }
    }
}
"#;

    #[test]
    fn scalar_array_and_matrix_declarations_are_typed() {
        let index = TypeIndex::scan(PROGRAM);
        assert_eq!(
            index.cast_type("total"),
            Some(ValueType::scalar(ElementType::Int))
        );
        assert_eq!(
            index.cast_type("values"),
            Some(ValueType::new(ElementType::Int, Rank::Vector))
        );
        assert_eq!(
            index.cast_type("grid"),
            Some(ValueType::new(ElementType::Int, Rank::Matrix))
        );
        assert_eq!(
            index.cast_type("ratio"),
            Some(ValueType::scalar(ElementType::Double))
        );
    }

    #[test]
    fn declarations_inside_string_literals_are_ignored() {
        let index = TypeIndex::scan(PROGRAM);
        assert!(index.lookup("fake").is_none());
    }

    #[test]
    fn unsupported_types_are_listed_without_a_cast() {
        let index = TypeIndex::scan(PROGRAM);
        assert_eq!(index.lookup("done").unwrap().declared_type, "bool");
        assert_eq!(index.cast_type("done"), None);
        assert!(index.listing().contains(&"done - bool".to_string()));
    }

    #[test]
    fn method_names_are_not_declarations() {
        let index = TypeIndex::scan(PROGRAM);
        assert!(index.lookup("Sum").is_none());
        assert!(index.lookup("Main").is_none());
        assert_eq!(index.lookup("args").unwrap().declared_type, "string[]");
    }

    #[test]
    fn foreach_variables_are_not_assignable() {
        let index = TypeIndex::scan(PROGRAM);
        assert!(!index.is_assignable("c"));
        assert!(!index.is_assignable("cell"));
        assert!(index.is_assignable("total"));
        assert!(index.is_assignable("never_declared"));
    }

    #[test]
    fn foreach_var_takes_the_collection_element_type() {
        let index = TypeIndex::scan(PROGRAM);
        assert_eq!(index.cast_type("c"), Some(ValueType::scalar(ElementType::Char)));
        assert_eq!(index.cast_type("v"), None);
    }

    #[test]
    fn loop_header_locals_are_scoped_to_their_loop() {
        let index = TypeIndex::scan(PROGRAM);
        let i = index.lookup("i").unwrap();
        assert!(i.loop_header);
        assert_eq!(i.line, 7);
        assert!(!index.lookup("total").unwrap().loop_header);
        assert!(index.is_scoped_within("i", 7, 8));
        assert!(!index.is_scoped_within("i", 8, 9));
        assert!(!index.is_scoped_within("total", 7, 8));
    }

    #[test]
    fn body_locals_are_scoped_to_their_block() {
        let source = "int a = 0;\nfor (int i = 0; i < 3; i++)\n{\n    int temp = i * 2;\n    a += temp;\n}\nint temp = 9;\n";
        let index = TypeIndex::scan(source);
        assert!(index.is_scoped_within("temp", 2, 6));
        assert!(!index.is_scoped_within("a", 2, 6));
        // A sibling declaration after the block is not yet in scope.
        assert!(!index.is_scoped_within("temp", 7, 8));
        assert!(!index.is_scoped_within("undeclared", 2, 6));
    }

    #[test]
    fn conflicting_declarations_have_no_cast() {
        let index = TypeIndex::scan("int x = 1;\nstring x = \"a\";\nint y;\nint y;\n");
        assert_eq!(index.cast_type("x"), None);
        assert_eq!(index.cast_type("y"), Some(ValueType::scalar(ElementType::Int)));
        assert_eq!(index.listing(), vec!["x - int", "y - int"]);
    }
}
