use super::Resolver;
use std::fmt::Write;

/// `$1, $2, ...` placeholders and `"double quoted"` identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresResolver;

impl Resolver for PostgresResolver {
    fn write_placeholder(&self, index: usize, out: &mut String) {
        let _ = write!(out, "${index}");
    }

    fn write_identifier(&self, name: &str, out: &mut String) {
        out.push('"');
        for c in name.chars() {
            if c == '"' {
                out.push('"');
            }
            out.push(c);
        }
        out.push('"');
    }
}
