use super::Resolver;

/// Anonymous `?` placeholders and `` `backtick quoted` `` identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlResolver;

impl Resolver for MySqlResolver {
    fn write_placeholder(&self, _index: usize, out: &mut String) {
        out.push('?');
    }

    fn write_identifier(&self, name: &str, out: &mut String) {
        out.push('`');
        for c in name.chars() {
            if c == '`' {
                out.push('`');
            }
            out.push(c);
        }
        out.push('`');
    }
}
