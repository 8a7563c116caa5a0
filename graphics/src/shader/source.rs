//! Declaration tables recovered from GLSL source text.
//!
//! Drivers report the members of a struct uniform in an implementation-defined
//! order, which says nothing about how the struct is laid out in a host-side
//! mirror. The only reliable source of the declaration order is the shader
//! text itself, so this module scans it into two tables:
//!
//! - [`StructDeclarations`]: struct name -> members in source order
//! - [`UniformDeclarations`]: uniform instance name -> declared type name
//!
//! The scanner is deliberately small. It understands `struct Name { ... };`
//! bodies whose members are written as `Type name;` or `Type a, b, c;`
//! (array suffixes and precision qualifiers are ignored) and
//! `uniform Type name;` declarations. Comments must be removed first with
//! [`strip_comments`].

use std::collections::HashMap;

/// Remove `/* */` and `//` comments.
///
/// Line breaks inside comments are kept so that the result has the same line
/// structure as the input. A block comment becomes a single space and an
/// unterminated one runs to the end of the text.
pub fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '/' {
            match chars.peek().copied() {
                Some('/') => {
                    for next in chars.by_ref() {
                        if next == '\n' {
                            out.push('\n');
                            break;
                        }
                    }
                    continue;
                }
                Some('*') => {
                    chars.next();
                    let mut previous = '\0';
                    for next in chars.by_ref() {
                        if next == '\n' {
                            out.push('\n');
                        }
                        if previous == '*' && next == '/' {
                            break;
                        }
                        previous = next;
                    }
                    out.push(' ');
                    continue;
                }
                _ => {}
            }
        }
        out.push(c);
    }

    out
}

/// Find the identifier that ends right before `offset`, skipping whitespace.
///
/// Returns the byte offset where the identifier starts and the identifier
/// itself, or `None` when the first non-whitespace character before `offset`
/// is not part of an identifier.
pub fn find_previous_word(source: &str, offset: usize) -> Option<(usize, &str)> {
    if offset > source.len() || !source.is_char_boundary(offset) {
        return None;
    }

    let head = source[..offset].trim_end();
    let end = head.len();
    let start = head
        .bytes()
        .rposition(|b| !is_identifier_byte(b))
        .map_or(0, |i| i + 1);

    (start < end).then(|| (start, &head[start..end]))
}

fn is_identifier_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Remove every `[...]` group, e.g. `lights[MAX_LIGHTS]` becomes `lights`.
fn strip_array_suffixes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;
    for c in text.chars() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

/// One member of a struct declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructMemberDeclaration {
    pub name: String,
    pub type_name: String,
}

/// Struct declarations found in a source, keyed by struct name.
#[derive(Debug, Clone, Default)]
pub struct StructDeclarations {
    structs: HashMap<String, Vec<StructMemberDeclaration>>,
}

impl StructDeclarations {
    /// Scan comment-free source for `struct Name { ... }` declarations.
    ///
    /// When a struct is declared twice (e.g. through two includes) the first
    /// declaration wins.
    pub fn parse(source: &str) -> Self {
        let mut structs = HashMap::new();
        let mut cursor = 0;

        while let Some(relative) = source[cursor..].find('{') {
            let open = cursor + relative;
            cursor = open + 1;

            let Some((name_start, name)) = find_previous_word(source, open) else {
                continue;
            };
            let is_struct = matches!(
                find_previous_word(source, name_start),
                Some((_, "struct"))
            );
            if !is_struct {
                continue;
            }

            let Some(close_relative) = source[open + 1..].find('}') else {
                break;
            };
            let body = &source[open + 1..open + 1 + close_relative];
            cursor = open + 1 + close_relative + 1;

            structs
                .entry(name.to_string())
                .or_insert_with(|| parse_struct_body(body));
        }

        Self { structs }
    }

    /// Members of `struct_name` in declaration order.
    pub fn members(&self, struct_name: &str) -> Option<&[StructMemberDeclaration]> {
        self.structs.get(struct_name).map(Vec::as_slice)
    }

    /// Zero-based position of `member` inside `struct_name`.
    pub fn member_order(&self, struct_name: &str, member: &str) -> Option<usize> {
        self.members(struct_name)?
            .iter()
            .position(|m| m.name == member)
    }

    /// Number of structs found.
    pub fn len(&self) -> usize {
        self.structs.len()
    }

    /// Whether no struct was found.
    pub fn is_empty(&self) -> bool {
        self.structs.is_empty()
    }
}

fn parse_struct_body(body: &str) -> Vec<StructMemberDeclaration> {
    body.split(';')
        .map(strip_array_suffixes)
        .flat_map(|line| parse_member_line(line.trim()))
        .collect()
}

/// Parse `Type a, b, c` into its declarators, in source order.
///
/// Names are collected walking backward from the end of the line and then
/// reversed.
fn parse_member_line(line: &str) -> Vec<StructMemberDeclaration> {
    let mut names = Vec::new();
    let mut cursor = line.len();

    while let Some((start, name)) = find_previous_word(line, cursor) {
        names.push(name);
        cursor = start;
        match line[..start].trim_end().strip_suffix(',') {
            Some(rest) => cursor = rest.len(),
            None => break,
        }
    }

    let Some((_, type_name)) = find_previous_word(line, cursor) else {
        return Vec::new();
    };

    names
        .into_iter()
        .rev()
        .map(|name| StructMemberDeclaration {
            name: name.to_string(),
            type_name: type_name.to_string(),
        })
        .collect()
}

/// `uniform Type name;` declarations found in a source.
#[derive(Debug, Clone, Default)]
pub struct UniformDeclarations {
    instances: HashMap<String, String>,
}

impl UniformDeclarations {
    /// Scan comment-free source for uniform declarations.
    ///
    /// Interface blocks (`uniform Block { ... }`) are not instances and are
    /// skipped.
    pub fn parse(source: &str) -> Self {
        let mut instances = HashMap::new();

        for statement in source.split([';', '{', '}']) {
            let Some(rest) = after_uniform_keyword(statement) else {
                continue;
            };
            let rest = strip_array_suffixes(rest);
            let mut declarators = rest.split(',');

            let Some(first) = declarators.next() else {
                continue;
            };
            let words: Vec<&str> = first.split_whitespace().collect();
            let [.., type_name, name] = words.as_slice() else {
                continue;
            };
            instances
                .entry(name.to_string())
                .or_insert_with(|| type_name.to_string());

            for declarator in declarators {
                if let Some(name) = declarator.split_whitespace().last() {
                    instances
                        .entry(name.to_string())
                        .or_insert_with(|| type_name.to_string());
                }
            }
        }

        Self { instances }
    }

    /// Declared type of uniform `name`.
    pub fn type_of(&self, name: &str) -> Option<&str> {
        self.instances.get(name).map(String::as_str)
    }

    /// Number of uniforms found.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether no uniform was found.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

/// The text following a standalone `uniform` keyword.
fn after_uniform_keyword(statement: &str) -> Option<&str> {
    const KEYWORD: &str = "uniform";

    statement.match_indices(KEYWORD).find_map(|(at, _)| {
        let before = statement[..at].bytes().next_back();
        let after = statement[at + KEYWORD.len()..].bytes().next();
        let standalone = !before.is_some_and(is_identifier_byte)
            && !after.is_some_and(is_identifier_byte);
        standalone.then(|| &statement[at + KEYWORD.len()..])
    })
}

/// Both declaration tables for every stage of one program.
#[derive(Debug, Clone, Default)]
pub struct SourceDeclarations {
    pub structs: StructDeclarations,
    pub uniforms: UniformDeclarations,
}

impl SourceDeclarations {
    /// Strip comments from every source and scan the combined text.
    pub fn parse(sources: &[&str]) -> Self {
        let combined = sources
            .iter()
            .map(|s| strip_comments(s))
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            structs: StructDeclarations::parse(&combined),
            uniforms: UniformDeclarations::parse(&combined),
        }
    }

    /// Struct type of a uniform path as the driver names it.
    ///
    /// Handles plain instances (`light`), array elements (`lights[2]`) and
    /// nested members (`scene.sun`).
    pub fn struct_type_of(&self, path: &str) -> Option<&str> {
        match path.rsplit_once('.') {
            None => self.uniforms.type_of(strip_index(path)),
            Some((parent, member)) => {
                let parent_type = self.struct_type_of(parent)?;
                let member = strip_index(member);
                self.structs
                    .members(parent_type)?
                    .iter()
                    .find(|m| m.name == member)
                    .map(|m| m.type_name.as_str())
            }
        }
    }
}

fn strip_index(name: &str) -> &str {
    name.split_once('[').map_or(name, |(base, _)| base)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member_names(structs: &StructDeclarations, name: &str) -> Vec<String> {
        structs
            .members(name)
            .unwrap_or_default()
            .iter()
            .map(|m| m.name.clone())
            .collect()
    }

    #[test]
    fn test_strip_line_comments() {
        let source = "float a; // trailing\n// whole line\nfloat b;";
        assert_eq!(strip_comments(source), "float a; \n\nfloat b;");
    }

    #[test]
    fn test_strip_block_comments_keeps_lines() {
        let source = "vec3 a;/* one\ntwo */vec3 b;";
        assert_eq!(strip_comments(source), "vec3 a;\n vec3 b;");
    }

    #[test]
    fn test_block_opener_inside_line_comment_is_ignored() {
        let source = "vec3 a; // a /*\nvec3 b;\n// */\nvec3 c;";
        assert_eq!(strip_comments(source), "vec3 a; \nvec3 b;\n\nvec3 c;");
    }

    #[test]
    fn test_line_opener_inside_block_comment_is_ignored() {
        let source = "vec3 a; /* b // */ vec3 c;";
        assert_eq!(strip_comments(source), "vec3 a;   vec3 c;");
    }

    #[test]
    fn test_strip_unterminated_block_comment() {
        assert_eq!(strip_comments("int x; /* never closed"), "int x;  ");
    }

    #[test]
    fn test_strip_keeps_division() {
        assert_eq!(strip_comments("a = b / c;"), "a = b / c;");
    }

    #[test]
    fn test_find_previous_word() {
        let source = "struct Light  {";
        let brace = source.find('{').unwrap();
        let (start, word) = find_previous_word(source, brace).unwrap();
        assert_eq!(word, "Light");
        assert_eq!(find_previous_word(source, start), Some((0, "struct")));
        assert_eq!(find_previous_word(source, 0), None);
        assert_eq!(find_previous_word("main() {", 7), None);
    }

    #[test]
    fn test_struct_members_in_source_order() {
        let source = "struct Light {\n    vec3 ambient;\n    vec3 diffuse;\n    float intensity;\n};";
        let structs = StructDeclarations::parse(source);
        assert_eq!(
            member_names(&structs, "Light"),
            vec!["ambient", "diffuse", "intensity"]
        );
        assert_eq!(structs.member_order("Light", "intensity"), Some(2));
    }

    #[test]
    fn test_multiple_declarators_on_one_line() {
        let source = "struct Material { vec3 ambient, diffuse , specular; float shininess; };";
        let structs = StructDeclarations::parse(source);
        assert_eq!(
            member_names(&structs, "Material"),
            vec!["ambient", "diffuse", "specular", "shininess"]
        );
        assert!(
            structs
                .members("Material")
                .unwrap()
                .iter()
                .take(3)
                .all(|m| m.type_name == "vec3")
        );
    }

    #[test]
    fn test_arrays_and_qualifiers_are_ignored() {
        let source = "struct Skin { highp mat4 bones[MAX_BONES]; mediump float weights[4], bias; };";
        let structs = StructDeclarations::parse(source);
        assert_eq!(
            member_names(&structs, "Skin"),
            vec!["bones", "weights", "bias"]
        );
        assert_eq!(structs.members("Skin").unwrap()[0].type_name, "mat4");
    }

    #[test]
    fn test_interface_blocks_and_functions_are_not_structs() {
        let source = "layout(std140) uniform Camera { mat4 view; };\nvoid main() { float x; }";
        let structs = StructDeclarations::parse(source);
        assert!(structs.is_empty());
    }

    #[test]
    fn test_uniform_declarations() {
        let source =
            "uniform Light light;\nlayout(location = 3) uniform highp vec3 tint;\nuniform Light lights[4], rim;";
        let uniforms = UniformDeclarations::parse(source);
        assert_eq!(uniforms.type_of("light"), Some("Light"));
        assert_eq!(uniforms.type_of("tint"), Some("vec3"));
        assert_eq!(uniforms.type_of("lights"), Some("Light"));
        assert_eq!(uniforms.type_of("rim"), Some("Light"));
    }

    #[test]
    fn test_uniform_keyword_must_be_standalone() {
        let uniforms = UniformDeclarations::parse("float uniformScale; uniform Block { vec4 a; };");
        assert!(uniforms.is_empty());
    }

    #[test]
    fn test_struct_type_of_paths() {
        let vs = "struct Sun { vec3 direction; vec3 color; };\n\
                  struct Scene { Sun sun; float exposure; };\n\
                  uniform Scene scene;";
        let fs = "// fragment stage\nstruct Light { vec3 color; };\nuniform Light lights[2];";
        let declarations = SourceDeclarations::parse(&[vs, fs]);

        assert_eq!(declarations.struct_type_of("scene"), Some("Scene"));
        assert_eq!(declarations.struct_type_of("scene.sun"), Some("Sun"));
        assert_eq!(declarations.struct_type_of("lights[1]"), Some("Light"));
        assert_eq!(declarations.struct_type_of("missing"), None);
    }
}
