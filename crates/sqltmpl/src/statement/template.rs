/// Split a `format!`-style template into literal segments.
///
/// Every `{}` is an interpolation slot; `{{` and `}}` are literal braces. Any
/// other brace is kept as-is, so SQL like `'{"a": 1}'` survives untouched.
pub(crate) fn split_template(template: &str) -> Vec<String> {
    let mut literals = Vec::new();
    let mut current = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('{', Some('{')) => {
                chars.next();
                current.push('{');
            }
            ('}', Some('}')) => {
                chars.next();
                current.push('}');
            }
            ('{', Some('}')) => {
                chars.next();
                literals.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }

    literals.push(current);
    literals
}
