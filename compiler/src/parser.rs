// Parser for Snare .x hook source files.
//
// Parses the token stream from the lexer into the declaration-level AST using
// chumsky combinators. Constructs the classifier does not inspect (statements,
// properties, bodies) are consumed as balanced token trees.
//
// Preconditions: none; any UTF-8 text is accepted as input.
// Postconditions: returns an AST plus the token spans and comments the
//   directive lookup needs, and any lex/parse errors.
// Failure modes: unbalanced delimiters or unrecognized characters produce
//   `Rich` errors and no AST.
// Side effects: none.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;

use crate::ast::*;
use crate::lexer::{self, Comment, Token};

/// Words accepted in modifier position. `class` is a keyword token and is
/// only a modifier in front of `func`.
const MODIFIERS: &[&str] = &[
    "private",
    "fileprivate",
    "internal",
    "public",
    "open",
    "final",
    "static",
    "override",
    "required",
    "convenience",
    "dynamic",
    "mutating",
    "nonmutating",
    "optional",
    "indirect",
    "nonisolated",
];

const EFFECTS: &[&str] = &["async", "throws", "rethrows"];

const IMPORT_KINDS: &[&str] = &["typealias", "protocol", "var", "let"];

/// Result of parsing: AST plus lexical side tables and any errors.
#[derive(Debug)]
pub struct ParseResult {
    pub file: Option<SourceFile>,
    /// Spans of significant tokens in source order.
    pub token_spans: Vec<lexer::Span>,
    /// Comments in source order.
    pub comments: Vec<Comment>,
    pub errors: Vec<Rich<'static, Token, SimpleSpan>>,
}

/// Parse a source string. Lexes then parses.
pub fn parse(source: &str) -> ParseResult {
    let lex_result = lexer::lex(source);
    let len = source.len();
    let token_spans = lex_result.tokens.iter().map(|(_, span)| *span).collect();
    let tokens = lex_result.tokens.clone();

    // Convert lexer output to chumsky stream.
    let token_iter = lex_result.tokens.into_iter().map(|(tok, span)| {
        let cspan: SimpleSpan = (span.start..span.end).into();
        (tok, cspan)
    });
    let eoi: SimpleSpan = (len..len).into();
    let stream = Stream::from_iter(token_iter).map(eoi, |(t, s): (_, _)| (t, s));

    let parser = file_parser(source);
    let (file, parse_errors) = parser.parse(stream).into_output_errors();

    // Merge lex errors + parse errors.
    let mut errors: Vec<Rich<'static, Token, SimpleSpan>> = lex_result
        .errors
        .into_iter()
        .map(|e| {
            let span: SimpleSpan = (e.span.start..e.span.end).into();
            Rich::custom(span, e.message)
        })
        .collect();
    errors.extend(parse_errors.into_iter().map(|e| e.into_owned()));
    if let Some(file) = &file {
        errors.extend(dangling_heads(file, &tokens, source));
    }

    // A file with lex errors is never classified, even if the remaining
    // tokens happened to parse.
    let file = if errors.is_empty() { file } else { None };

    ParseResult {
        file,
        token_spans,
        comments: lex_result.comments,
        errors,
    }
}

// ── Dangling declaration heads ──
//
// A declaration keyword that ends up inside an opaque token tree belongs to
// a declaration that did not parse, e.g. `class H: ClassHook<` or a bare
// `import` at the end of the file.

/// Words after `class` that make it a member modifier rather than a type head.
const CLASS_MEMBER_WORDS: &[&str] = &["var", "let", "subscript", "typealias"];

fn dangling_heads(
    file: &SourceFile,
    tokens: &[(Token, lexer::Span)],
    source: &str,
) -> Vec<Rich<'static, Token, SimpleSpan>> {
    let mut spans = Vec::new();
    for item in &file.items {
        match item {
            Item::Other(span) => spans.push(*span),
            Item::Type(decl) => collect_other_members(&decl.members, &mut spans),
            Item::Extension(ext) => collect_other_members(&ext.members, &mut spans),
            Item::Import(_) | Item::Func(_) => {}
        }
    }

    spans
        .into_iter()
        .filter_map(|span| {
            let index = tokens
                .binary_search_by_key(&span.start, |(_, s)| s.start)
                .ok()?;
            let (token, token_span) = &tokens[index];
            let is_head = match token {
                Token::Import | Token::Struct | Token::Enum | Token::Extension => true,
                Token::Class => !introduces_member(tokens.get(index + 1), source),
                _ => false,
            };
            is_head.then(|| {
                let at: SimpleSpan = (token_span.start..token_span.end).into();
                Rich::custom(at, format!("unterminated {} declaration", token))
            })
        })
        .collect()
}

fn collect_other_members(members: &[Member], spans: &mut Vec<SimpleSpan>) {
    for member in members {
        match member {
            Member::Other(span) => spans.push(*span),
            Member::Type(decl) => collect_other_members(&decl.members, spans),
            Member::Func(_) => {}
        }
    }
}

/// Whether the token after `class` makes it a type-level member modifier.
fn introduces_member(next: Option<&(Token, lexer::Span)>, source: &str) -> bool {
    match next {
        Some((Token::Func, _)) => true,
        Some((Token::Ident, span)) => {
            let word = &source[span.start..span.end];
            CLASS_MEMBER_WORDS.contains(&word) || MODIFIERS.contains(&word)
        }
        _ => false,
    }
}

fn is_delimiter(token: &Token) -> bool {
    matches!(
        token,
        Token::LParen
            | Token::RParen
            | Token::LBracket
            | Token::RBracket
            | Token::LBrace
            | Token::RBrace
    )
}

/// Tokens that end a type at nesting depth zero.
fn ends_type(token: &Token) -> bool {
    is_delimiter(token)
        || matches!(
            token,
            Token::Comma
                | Token::Colon
                | Token::Semicolon
                | Token::Eq
                | Token::Lt
                | Token::Gt
                | Token::Where
        )
}

fn normalize(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Main parser builder ──
//
// All grammar rules are built inside `file_parser` so that the `source`
// reference is captured once and shared by all combinators.

fn file_parser<'tokens, 'src: 'tokens, I>(
    source: &'src str,
) -> impl Parser<'tokens, I, SourceFile, extra::Err<Rich<'tokens, Token, SimpleSpan>>> + 'src
where
    'tokens: 'src,
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    let text = move |span: SimpleSpan| normalize(&source[span.start()..span.end()]);

    // ── Token trees ──
    //
    // A tree is one non-delimiter token or a balanced group. Closing
    // delimiters never start a tree, so `repeated()` stops at the end of the
    // enclosing group.

    let tree = recursive(|tree| {
        choice((
            tree.clone()
                .repeated()
                .delimited_by(just(Token::LParen), just(Token::RParen)),
            tree.clone()
                .repeated()
                .delimited_by(just(Token::LBracket), just(Token::RBracket)),
            tree.repeated()
                .delimited_by(just(Token::LBrace), just(Token::RBrace)),
            any().filter(|t: &Token| !is_delimiter(t)).ignored(),
        ))
    });

    let paren_group = tree
        .clone()
        .repeated()
        .delimited_by(just(Token::LParen), just(Token::RParen));
    let bracket_group = tree
        .clone()
        .repeated()
        .delimited_by(just(Token::LBracket), just(Token::RBracket));
    let brace_group = tree
        .clone()
        .repeated()
        .delimited_by(just(Token::LBrace), just(Token::RBrace));

    // ── Identifier ──

    let ident = just(Token::Ident).map_with(move |_, e| {
        let span: SimpleSpan = e.span();
        Ident {
            name: source[span.start()..span.end()].to_string(),
            span,
        }
    });

    let qualified = ident
        .clone()
        .separated_by(just(Token::Dot))
        .at_least(1)
        .collect::<Vec<_>>()
        .map_with(|parts: Vec<Ident>, e| Ident {
            name: parts
                .iter()
                .map(|p| p.name.as_str())
                .collect::<Vec<_>>()
                .join("."),
            span: e.span(),
        });

    // ── Types ──
    //
    // Types are not interpreted, only delimited: a run of tokens up to the
    // next depth-zero terminator, with `<...>` tracked so generic argument
    // lists may contain commas.

    let type_tokens = recursive(|ty| {
        let angle = ty
            .clone()
            .or(just(Token::Comma).ignored())
            .repeated()
            .delimited_by(just(Token::Lt), just(Token::Gt));
        choice((
            paren_group.clone(),
            bracket_group.clone(),
            angle,
            any().filter(|t: &Token| !ends_type(t)).ignored(),
        ))
        .repeated()
        .at_least(1)
    });

    let type_ref = type_tokens.map_with(move |_, e| {
        let span: SimpleSpan = e.span();
        TypeRef {
            text: text(span),
            span,
        }
    });

    // Generic parameter clauses may carry constraints (`<T: Equatable>`), so
    // they are skipped as raw angle groups rather than parsed as types.
    let generic_clause = recursive(|angle| {
        choice((
            angle,
            any()
                .filter(|t: &Token| {
                    !matches!(
                        t,
                        Token::Lt | Token::Gt | Token::LBrace | Token::RBrace | Token::Semicolon
                    )
                })
                .ignored(),
        ))
        .repeated()
        .delimited_by(just(Token::Lt), just(Token::Gt))
    })
    .map_with(move |_, e| text(e.span()));

    let where_clause = just(Token::Where).ignore_then(
        any()
            .filter(|t: &Token| !matches!(t, Token::LBrace | Token::RBrace | Token::Semicolon))
            .repeated(),
    );

    // ── Attributes and modifiers ──

    let attribute = just(Token::At)
        .ignore_then(ident.clone())
        .then(
            paren_group
                .clone()
                .map_with(move |_, e| {
                    let span: SimpleSpan = e.span();
                    source[span.start() + 1..span.end() - 1].trim().to_string()
                })
                .or_not(),
        )
        .map_with(|(name, args), e| Attribute {
            name,
            args,
            span: e.span(),
        });
    let attributes = attribute.repeated().collect::<Vec<_>>();

    let word_modifier = ident
        .clone()
        .filter(|id: &Ident| MODIFIERS.contains(&id.name.as_str()))
        .map(|id| Modifier {
            name: id.name,
            span: id.span,
        });
    let func_modifier = word_modifier.clone().or(just(Token::Class).map_with(|_, e| Modifier {
        name: "class".to_string(),
        span: e.span(),
    }));

    // ── Inheritance clause ──

    let generic_args = type_ref
        .clone()
        .separated_by(just(Token::Comma))
        .collect::<Vec<_>>()
        .delimited_by(just(Token::Lt), just(Token::Gt));

    let inherited = qualified
        .clone()
        .then(generic_args.clone().or_not())
        .map_with(|(name, args), e| InheritedType {
            name,
            generic_args: args.unwrap_or_default(),
            span: e.span(),
        });

    let inherit_clause = just(Token::Colon).ignore_then(
        inherited
            .separated_by(just(Token::Comma))
            .at_least(1)
            .collect::<Vec<_>>(),
    );

    // ── Import: attrs 'import' kind? path ──

    let import_kind = choice((
        just(Token::Class).map(|_| "class".to_string()),
        just(Token::Struct).map(|_| "struct".to_string()),
        just(Token::Enum).map(|_| "enum".to_string()),
        just(Token::Func).map(|_| "func".to_string()),
        ident
            .clone()
            .filter(|id: &Ident| IMPORT_KINDS.contains(&id.name.as_str()))
            .map(|id| id.name),
    ));

    let import = attributes
        .clone()
        .then_ignore(just(Token::Import))
        .then(import_kind.or_not())
        .then(
            ident
                .clone()
                .separated_by(just(Token::Dot))
                .at_least(1)
                .collect::<Vec<_>>(),
        )
        .map_with(|((attributes, kind), path), e| ImportDecl {
            attributes,
            kind,
            path,
            span: e.span(),
        });

    // ── Function: attrs mods 'func' name generics? '(' params ')' effects ('->' type)? where? body? ──

    let func_name = ident.clone().or(any()
        .filter(|t: &Token| {
            matches!(
                t,
                Token::Operator | Token::Lt | Token::Gt | Token::Eq | Token::Bang | Token::Question
            )
        })
        .map_with(move |_, e| {
            let span: SimpleSpan = e.span();
            Ident {
                name: source[span.start()..span.end()].to_string(),
                span,
            }
        }));

    let default_value = choice((
        paren_group.clone(),
        bracket_group.clone(),
        brace_group.clone(),
        any()
            .filter(|t: &Token| !is_delimiter(t) && !matches!(t, Token::Comma))
            .ignored(),
    ))
    .repeated()
    .at_least(1);

    let param = ident
        .clone()
        .then(ident.clone().or_not())
        .then_ignore(just(Token::Colon))
        .then(type_ref.clone())
        .then_ignore(just(Token::Eq).then(default_value).or_not())
        .map_with(|((first, second), ty), e| match second {
            Some(name) => Param {
                label: Some(first),
                name,
                ty,
                span: e.span(),
            },
            None => Param {
                label: None,
                name: first,
                ty,
                span: e.span(),
            },
        });

    let params = param
        .separated_by(just(Token::Comma))
        .allow_trailing()
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LParen), just(Token::RParen));

    let effects = ident
        .clone()
        .filter(|id: &Ident| EFFECTS.contains(&id.name.as_str()))
        .map(|id| id.name)
        .repeated()
        .collect::<Vec<_>>();

    let func_decl = attributes
        .clone()
        .then(func_modifier.repeated().collect::<Vec<_>>())
        .then_ignore(just(Token::Func))
        .then(func_name)
        .then(generic_clause.clone().or_not())
        .then(params)
        .then(effects)
        .then(just(Token::Arrow).ignore_then(type_ref.clone()).or_not())
        .then_ignore(where_clause.clone().or_not())
        .then_ignore(brace_group.clone().or_not())
        .map_with(
            |((((((attributes, modifiers), name), generics), params), effects), return_type), e| {
                FuncDecl {
                    attributes,
                    modifiers,
                    name,
                    generics,
                    params,
                    effects,
                    return_type,
                    span: e.span(),
                }
            },
        );

    // ── Type declaration: attrs mods kind name generics? inherits? where? '{' members '}' ──

    let type_decl = recursive(|type_decl| {
        let type_kind = choice((
            just(Token::Class).to(TypeKind::Class),
            just(Token::Struct).to(TypeKind::Struct),
            just(Token::Enum).to(TypeKind::Enum),
        ));

        let member = choice((
            func_decl.clone().map(Member::Func),
            type_decl.map(Member::Type),
            tree.clone().map_with(|_, e| Member::Other(e.span())),
        ));

        attributes
            .clone()
            .then(word_modifier.clone().repeated().collect::<Vec<_>>())
            .then(type_kind)
            .then(ident.clone())
            .then_ignore(generic_clause.clone().or_not())
            .then(inherit_clause.clone().or_not())
            .then_ignore(where_clause.clone().or_not())
            .then(
                member
                    .repeated()
                    .collect::<Vec<_>>()
                    .delimited_by(just(Token::LBrace), just(Token::RBrace)),
            )
            .map_with(
                |(((((attributes, modifiers), kind), name), inherits), members), e| TypeDecl {
                    attributes,
                    modifiers,
                    kind,
                    name,
                    inherits: inherits.unwrap_or_default(),
                    members,
                    span: e.span(),
                },
            )
    });

    let member = choice((
        func_decl.clone().map(Member::Func),
        type_decl.clone().map(Member::Type),
        tree.clone().map_with(|_, e| Member::Other(e.span())),
    ));

    // ── Extension: attrs mods 'extension' type inherits? where? '{' members '}' ──

    let extended_type = qualified
        .then(generic_args.or_not())
        .map_with(move |_, e| {
            let span: SimpleSpan = e.span();
            TypeRef {
                text: text(span),
                span,
            }
        });

    let extension = attributes
        .clone()
        .ignore_then(word_modifier.repeated())
        .ignore_then(just(Token::Extension))
        .ignore_then(extended_type)
        .then_ignore(inherit_clause.or_not())
        .then_ignore(where_clause.or_not())
        .then(
            member
                .repeated()
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LBrace), just(Token::RBrace)),
        )
        .map_with(|(extended, members), e| ExtensionDecl {
            extended,
            members,
            span: e.span(),
        });

    // ── File ──

    let item = choice((
        import.map(Item::Import),
        type_decl.map(Item::Type),
        extension.map(Item::Extension),
        func_decl.map(Item::Func),
        tree.map_with(|_, e| Item::Other(e.span())),
    ));

    item.repeated()
        .collect::<Vec<_>>()
        .then_ignore(end())
        .map_with(|items, e| SourceFile {
            items,
            span: e.span(),
        })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> SourceFile {
        let result = parse(source);
        assert!(
            result.errors.is_empty(),
            "unexpected parse errors: {:?}",
            result.errors
        );
        result.file.expect("expected a parsed file")
    }

    fn only_type(file: &SourceFile) -> &TypeDecl {
        let types: Vec<&TypeDecl> = file
            .items
            .iter()
            .filter_map(|item| match item {
                Item::Type(t) => Some(t),
                _ => None,
            })
            .collect();
        assert_eq!(types.len(), 1, "expected exactly one type: {:?}", file);
        types[0]
    }

    // ── Imports ──

    #[test]
    fn imports_with_and_without_kind() {
        let file = parse_ok("import Foundation\n@testable import class UIKit.UIView\n");
        let Item::Import(first) = &file.items[0] else {
            panic!("expected import, got {:?}", file.items[0]);
        };
        assert_eq!(first.kind, None);
        assert_eq!(first.path[0].name, "Foundation");

        let Item::Import(second) = &file.items[1] else {
            panic!("expected import, got {:?}", file.items[1]);
        };
        assert_eq!(second.kind.as_deref(), Some("class"));
        assert_eq!(second.attributes[0].name.name, "testable");
        let path: Vec<&str> = second.path.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(path, vec!["UIKit", "UIView"]);
    }

    // ── Type declarations ──

    #[test]
    fn class_with_generic_inheritance() {
        let file = parse_ok("final class LabelHook: ClassHook<UILabel>, Other {}");
        let decl = only_type(&file);
        assert_eq!(decl.kind, TypeKind::Class);
        assert_eq!(decl.name.name, "LabelHook");
        assert_eq!(decl.modifiers[0].name, "final");
        assert_eq!(decl.inherits.len(), 2);
        assert_eq!(decl.inherits[0].name.name, "ClassHook");
        assert_eq!(decl.inherits[0].generic_args[0].text, "UILabel");
        assert_eq!(decl.inherits[1].name.name, "Other");
        assert!(decl.inherits[1].generic_args.is_empty());
    }

    #[test]
    fn nested_generic_argument() {
        let file = parse_ok("class H: ClassHook<Dictionary<String, Int>> {}");
        let decl = only_type(&file);
        assert_eq!(
            decl.inherits[0].generic_args[0].text,
            "Dictionary<String, Int>"
        );
    }

    #[test]
    fn struct_and_enum_kinds() {
        let file = parse_ok("struct A: Tweak {}\nenum B: TweakWithBackend {}");
        let kinds: Vec<TypeKind> = file
            .items
            .iter()
            .filter_map(|i| match i {
                Item::Type(t) => Some(t.kind),
                _ => None,
            })
            .collect();
        assert_eq!(kinds, vec![TypeKind::Struct, TypeKind::Enum]);
    }

    #[test]
    fn attributes_on_type() {
        let file = parse_ok("@available(iOS 14, *) class H: FunctionHook {}");
        let decl = only_type(&file);
        let attr = decl.attribute("available").expect("available attribute");
        assert_eq!(attr.args.as_deref(), Some("iOS 14, *"));
        assert_eq!(decl.span.start(), 0);
    }

    // ── Functions ──

    #[test]
    fn method_signature() {
        let source = r#"
class H: ClassHook<NSObject> {
    @objc(fooWithBar:baz:)
    class func foo(_ bar: Int, baz qux: [String: Int] = [:]) throws -> String? {
        let x = "}"
        return nil
    }
}
"#;
        let file = parse_ok(source);
        let decl = only_type(&file);
        let func = decl.functions().next().expect("one method");
        assert_eq!(func.name.name, "foo");
        assert!(func.modifier("class").is_some());
        assert_eq!(
            func.attribute("objc").and_then(|a| a.args.as_deref()),
            Some("fooWithBar:baz:")
        );
        assert_eq!(func.params.len(), 2);
        assert_eq!(func.params[0].external_label(), "_");
        assert_eq!(func.params[0].name.name, "bar");
        assert_eq!(func.params[0].ty.text, "Int");
        assert_eq!(func.params[1].external_label(), "baz");
        assert_eq!(func.params[1].ty.text, "[String: Int]");
        assert_eq!(func.effects, vec!["throws".to_string()]);
        assert_eq!(func.return_type.as_ref().map(|t| t.text.as_str()), Some("String?"));
    }

    #[test]
    fn closure_parameter_type() {
        let file = parse_ok(
            "class H: FunctionHook { func function(_ cb: @escaping (Int, Bool) -> Void) {} }",
        );
        let decl = only_type(&file);
        let func = decl.functions().next().expect("function");
        assert_eq!(func.params[0].ty.text, "@escaping (Int, Bool) -> Void");
        assert!(func.return_type.is_none());
    }

    #[test]
    fn generic_method_with_where_clause() {
        let file = parse_ok("class H { func f<T: Equatable>(x: T) -> T where T: Hashable { x } }");
        let decl = only_type(&file);
        let func = decl.functions().next().expect("method");
        assert_eq!(func.generics.as_deref(), Some("<T: Equatable>"));
        assert_eq!(func.return_type.as_ref().map(|t| t.text.as_str()), Some("T"));
    }

    // ── Members ──

    #[test]
    fn stray_members_are_skipped() {
        let source = r#"
class H: ClassHook<UIView> {
    static let target = Target(name: "x")
    @Property(.nonatomic) var count = 0
    class var shared: H { H() }
    func layoutSubviews() { orig { } }
}
"#;
        let decl_file = parse_ok(source);
        let decl = only_type(&decl_file);
        let names: Vec<&str> = decl.functions().map(|f| f.name.name.as_str()).collect();
        assert_eq!(names, vec!["layoutSubviews"]);
    }

    #[test]
    fn nested_type_declarations() {
        let file = parse_ok("class Outer { class Inner: Tweak {} }");
        let outer = only_type(&file);
        let Member::Type(inner) = &outer.members[0] else {
            panic!("expected nested type, got {:?}", outer.members[0]);
        };
        assert_eq!(inner.name.name, "Inner");
    }

    #[test]
    fn extension_members() {
        let file = parse_ok("extension Foo.Bar: Baz { class Inner: FunctionHook {} }");
        let Item::Extension(ext) = &file.items[0] else {
            panic!("expected extension, got {:?}", file.items[0]);
        };
        assert_eq!(ext.extended.text, "Foo.Bar");
        assert_eq!(ext.members.len(), 1);
    }

    #[test]
    fn top_level_statements_are_other() {
        let file = parse_ok("let x = foo(1, 2)\nprint(x)");
        assert!(file.items.iter().all(|i| matches!(i, Item::Other(_))));
    }

    // ── Side tables ──

    #[test]
    fn comments_and_token_spans_are_returned() {
        let result = parse("// snare:disable\nclass A {}");
        assert_eq!(result.comments.len(), 1);
        assert_eq!(result.token_spans.len(), 4);
        assert_eq!(result.token_spans[0].start, 17);
    }

    // ── Errors ──

    #[test]
    fn unbalanced_brace_is_an_error() {
        let result = parse("class A {");
        assert!(result.file.is_none());
        assert!(!result.errors.is_empty());
    }

    #[test]
    fn truncated_type_head_is_an_error() {
        let result = parse("class H: ClassHook<");
        assert!(result.file.is_none());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].span().start, 0);
        assert_eq!(
            result.errors[0].to_string(),
            "unterminated 'class' declaration"
        );
    }

    #[test]
    fn bare_import_at_end_is_an_error() {
        let result = parse("import UIKit\nimport");
        assert!(result.file.is_none());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].span().start, 13);
    }

    #[test]
    fn class_member_modifiers_are_not_heads() {
        let file = parse_ok("class H: ClassHook<UIView> {\n    class var shared: Int = 0\n}\n");
        let decl = only_type(&file);
        assert!(decl.members.iter().all(|m| matches!(m, Member::Other(_))));
    }

    #[test]
    fn lex_error_discards_tree() {
        let result = parse("class A {} ☃");
        assert!(result.file.is_none());
        assert!(!result.errors.is_empty());
    }
}
