//! Descriptor and generic-signature parsing.
//!
//! Class-file descriptors name classes in internal form (`java/lang/String`);
//! the symbol table holds qualified names (`java.lang.String`). Helpers here
//! return qualified names.

/// Convert an internal class name to its qualified form.
pub fn qualified_name(internal: &str) -> String {
    internal.replace('/', ".")
}

/// Split a method descriptor into its parameter part (with parentheses)
/// and its return part.
///
/// `(ILjava/lang/String;)V` → `("(ILjava/lang/String;)", "V")`.
pub fn method_parts(descriptor: &str) -> Option<(&str, &str)> {
    if !descriptor.starts_with('(') {
        return None;
    }
    let close = descriptor.find(')')?;
    Some((&descriptor[..=close], &descriptor[close + 1..]))
}

/// Length of the field type starting at `start`, if well formed.
fn field_type_len(bytes: &[u8], start: usize) -> Option<usize> {
    let mut pos = start;
    while bytes.get(pos) == Some(&b'[') {
        pos += 1;
    }
    match bytes.get(pos)? {
        b'L' => {
            let end = bytes[pos..].iter().position(|&b| b == b';')?;
            Some(pos + end + 1 - start)
        }
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' => Some(pos + 1 - start),
        _ => None,
    }
}

/// Parameter type descriptors of a method descriptor (or of its parameter
/// part).
pub fn parameter_types(descriptor: &str) -> Option<Vec<&str>> {
    let bytes = descriptor.as_bytes();
    if bytes.first() != Some(&b'(') {
        return None;
    }
    let mut params = Vec::new();
    let mut pos = 1;
    while bytes.get(pos)? != &b')' {
        let len = field_type_len(bytes, pos)?;
        params.push(&descriptor[pos..pos + len]);
        pos += len;
    }
    Some(params)
}

/// Qualified names of all classes mentioned in a field or method
/// descriptor, in order of appearance.
pub fn descriptor_classes(descriptor: &str) -> Vec<String> {
    let mut classes = Vec::new();
    let mut rest = descriptor;
    while let Some(start) = rest.find('L') {
        let after = &rest[start + 1..];
        let Some(end) = after.find(';') else {
            break;
        };
        let name = qualified_name(&after[..end]);
        if !classes.contains(&name) {
            classes.push(name);
        }
        rest = &after[end + 1..];
    }
    classes
}

/// Qualified names of all classes mentioned in a class, method or field
/// generic signature: bounds, superclass and superinterfaces, type
/// arguments, parameter, return and thrown types.
///
/// Malformed input yields whatever was collected before the error.
pub fn signature_classes(signature: &str) -> Vec<String> {
    let mut scanner = SignatureScanner {
        bytes: signature.as_bytes(),
        text: signature,
        pos: 0,
        classes: Vec::new(),
    };
    scanner.scan();
    scanner.classes
}

struct SignatureScanner<'a> {
    bytes: &'a [u8],
    text: &'a str,
    pos: usize,
    classes: Vec<String>,
}

impl<'a> SignatureScanner<'a> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn scan(&mut self) {
        if self.peek() == Some(b'<') && !self.type_parameters() {
            return;
        }
        while let Some(b) = self.peek() {
            match b {
                b'(' | b')' | b'^' | b'V' => self.pos += 1,
                _ => {
                    if !self.type_signature() {
                        return;
                    }
                }
            }
        }
    }

    /// `<` (Ident `:` [RefType] (`:` RefType)*)+ `>`
    fn type_parameters(&mut self) -> bool {
        self.pos += 1;
        loop {
            match self.peek() {
                Some(b'>') => {
                    self.pos += 1;
                    return true;
                }
                Some(_) => {}
                None => return false,
            }
            let Some(colon) = self.bytes[self.pos..].iter().position(|&b| b == b':') else {
                return false;
            };
            self.pos += colon;
            while self.peek() == Some(b':') {
                self.pos += 1;
                if matches!(self.peek(), Some(b'L' | b'T' | b'[')) && !self.type_signature() {
                    return false;
                }
            }
        }
    }

    fn type_signature(&mut self) -> bool {
        match self.peek() {
            Some(b'L') => self.class_type(),
            Some(b'T') => match self.bytes[self.pos..].iter().position(|&b| b == b';') {
                Some(end) => {
                    self.pos += end + 1;
                    true
                }
                None => false,
            },
            Some(b'[') => {
                self.pos += 1;
                self.type_signature()
            }
            Some(b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z') => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn identifier(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if matches!(b, b'<' | b';' | b'.') {
                break;
            }
            self.pos += 1;
        }
        &self.text[start..self.pos]
    }

    /// `L` name TypeArgs? (`.` Ident TypeArgs?)* `;`
    fn class_type(&mut self) -> bool {
        self.pos += 1;
        let mut name = self.identifier().to_string();
        loop {
            match self.peek() {
                Some(b'<') => {
                    if !self.type_arguments() {
                        return false;
                    }
                }
                Some(b'.') => {
                    self.pos += 1;
                    let inner = self.identifier();
                    name.push('$');
                    name.push_str(inner);
                }
                Some(b';') => {
                    self.pos += 1;
                    let name = qualified_name(&name);
                    if !self.classes.contains(&name) {
                        self.classes.push(name);
                    }
                    return true;
                }
                _ => return false,
            }
        }
    }

    fn type_arguments(&mut self) -> bool {
        self.pos += 1;
        loop {
            match self.peek() {
                Some(b'>') => {
                    self.pos += 1;
                    return true;
                }
                Some(b'*') => self.pos += 1,
                Some(b'+' | b'-') => {
                    self.pos += 1;
                    if !self.type_signature() {
                        return false;
                    }
                }
                Some(_) => {
                    if !self.type_signature() {
                        return false;
                    }
                }
                None => return false,
            }
        }
    }
}

/// Drop a leading formal type parameter section (`<T:...>`).
pub fn strip_type_parameters(signature: &str) -> &str {
    if !signature.starts_with('<') {
        return signature;
    }
    let mut depth = 0usize;
    for (idx, b) in signature.bytes().enumerate() {
        match b {
            b'<' => depth += 1,
            b'>' => {
                depth -= 1;
                if depth == 0 {
                    return &signature[idx + 1..];
                }
            }
            _ => {}
        }
    }
    signature
}

/// Split a generic method signature into parameter and return parts,
/// dropping type parameters and the throws clause.
pub fn split_method_signature(signature: &str) -> Option<(&str, &str)> {
    let rest = strip_type_parameters(signature);
    let (params, tail) = method_parts(rest)?;
    let ret = tail.find('^').map_or(tail, |idx| &tail[..idx]);
    Some((params, ret))
}

/// Source-level spelling of a field type descriptor: `[[I` → `int[][]`,
/// `Ljava/util/List;` → `java.util.List`.
pub fn to_source_type(descriptor: &str) -> Option<String> {
    let depth = descriptor.bytes().take_while(|&b| b == b'[').count();
    let element = &descriptor[depth..];
    let mut name = match element.as_bytes().first()? {
        b'B' => "byte".to_string(),
        b'C' => "char".to_string(),
        b'D' => "double".to_string(),
        b'F' => "float".to_string(),
        b'I' => "int".to_string(),
        b'J' => "long".to_string(),
        b'S' => "short".to_string(),
        b'Z' => "boolean".to_string(),
        b'V' => "void".to_string(),
        b'L' => {
            let end = element.find(';')?;
            qualified_name(&element[1..end])
        }
        _ => return None,
    };
    for _ in 0..depth {
        name.push_str("[]");
    }
    Some(name)
}

/// Java identifier check used before asking a source index about a
/// method: rejects `<init>`, `<clinit>` and other synthetic names.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// `Outer$1`, `Outer$Inner$12`: the last `$` segment is all digits.
pub fn is_anonymous_class(qualified: &str) -> bool {
    qualified.rsplit_once('$').is_some_and(|(_, tail)| {
        !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit())
    })
}

#[cfg(test)]
mod tests;
