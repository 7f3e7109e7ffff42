//! IR → ECMAScript text (spec §6 printer interface). This is the reference
//! emitter the IR is designed against: the lowerer never hand-waves a shape
//! the printer can't turn into valid output.
//!
//! By construction every [`IrNode`] reaching this module already passed
//! through lowering (and, for `fx`, the purity verifier), so printing itself
//! is infallible — there is no malformed-input case left to reject.

use crate::ir::{ClassConstructor, ClassField, ClassMethod, EnumCase, IrNode, ObjectProperty, VariableKind};

const INDENT: &str = "  ";

/// Runtime property types treated as primitives: assigned directly into an
/// `fx` parameter rather than passed through `structuredClone`.
const PRIMITIVE_TYPES: &[&str] = &["Int", "Number", "Double", "Float", "String", "Boolean", "Bool"];

pub fn print_program(program: &IrNode) -> String {
    let mut printer = Printer::new();
    match program {
        IrNode::Program(forms) => {
            let mut out = String::new();
            for form in forms {
                let line = printer.stmt(form);
                if line.is_empty() {
                    continue;
                }
                out.push_str(&line);
                out.push('\n');
            }
            out
        }
        other => printer.stmt(other),
    }
}

struct Printer {
    depth: usize,
    gensym: usize,
}

impl Printer {
    fn new() -> Self {
        Printer { depth: 0, gensym: 0 }
    }

    fn indent(&self) -> String {
        INDENT.repeat(self.depth)
    }

    /// A fresh identifier for a printer-introduced IIFE temporary, distinct
    /// from anything the lowerer's `mangled()` naming could produce.
    fn temp(&mut self, label: &str) -> String {
        self.gensym += 1;
        format!("__hql_{label}{}", self.gensym)
    }

    // ---- statements -------------------------------------------------

    fn stmt(&mut self, node: &IrNode) -> String {
        match node {
            IrNode::BlockStatement(stmts) => self.block(stmts),
            IrNode::ReturnStatement(value) => match value {
                Some(v) => format!("{}return {};", self.indent(), self.expr(v)),
                None => format!("{}return;", self.indent()),
            },
            IrNode::IfStatement { test, consequent, alternate } => {
                let mut out = format!("{}if ({}) {}", self.indent(), self.expr(test), self.block_of(consequent));
                if let Some(alt) = alternate {
                    out.push_str(" else ");
                    out.push_str(self.block_of(alt).trim_start());
                }
                out
            }
            IrNode::VariableDeclaration { kind, name, init } => {
                let keyword = variable_keyword(*kind);
                match init {
                    Some(v) => format!("{}{keyword} {name} = {};", self.indent(), self.expr(v)),
                    None => format!("{}{keyword} {name};", self.indent()),
                }
            }
            IrNode::FunctionDeclaration { name, params, body } => {
                format!("{}function {name}({}) {}", self.indent(), params.join(", "), self.block_of(body))
            }
            IrNode::FnFunctionDeclaration { name, params, defaults, rest, body } => self.fn_decl(name, params, defaults, rest.as_deref(), body),
            IrNode::FxFunctionDeclaration { name, params, defaults, param_types, return_type, body } => {
                let _ = return_type; // no runtime type checking is emitted; the purity verifier already ran at compile time
                self.fx_decl(name, params, defaults, param_types, body)
            }
            IrNode::ClassDeclaration { name, fields, constructor, methods } => self.class_decl(name, fields, constructor, methods),
            IrNode::EnumDeclaration { name, raw_type, cases } => self.enum_decl(name, raw_type.as_deref(), cases),
            IrNode::ImportDeclaration { specifiers, source } => {
                let names: Vec<String> = specifiers.iter().map(|s| if s.imported == s.local { s.local.clone() } else { format!("{} as {}", s.imported, s.local) }).collect();
                format!("{}import {{ {} }} from \"{}\";", self.indent(), names.join(", "), source)
            }
            IrNode::JsImportReference { namespace_name, source, default_name } => self.js_import_reference(namespace_name, source, default_name.as_deref()),
            IrNode::ExportNamedDeclaration { names } => format!("{}export {{ {} }};", self.indent(), names.join(", ")),
            IrNode::ExportVariableDeclaration { declaration } => format!("{}export {}", self.indent(), self.stmt(declaration).trim_start()),
            IrNode::CommentBlock(text) => {
                if text.is_empty() {
                    String::new()
                } else {
                    format!("{}// {text}", self.indent())
                }
            }
            IrNode::Raw(text) => text.clone(),
            other => format!("{}{};", self.indent(), self.expr(other)),
        }
    }

    fn block(&mut self, stmts: &[IrNode]) -> String {
        self.depth += 1;
        let lines: Vec<String> = stmts.iter().map(|s| self.stmt(s)).filter(|l| !l.is_empty()).collect();
        self.depth -= 1;
        if lines.is_empty() {
            "{}".to_string()
        } else {
            format!("{{\n{}\n{}}}", lines.join("\n"), self.indent())
        }
    }

    /// `block`, but accepts any node (a bare expression becomes a
    /// single-statement block) — used for `if` branches, which the lowerer
    /// always hands a `BlockStatement`, but this stays defensive for any
    /// node the dispatch table didn't wrap.
    fn block_of(&mut self, node: &IrNode) -> String {
        match node {
            IrNode::BlockStatement(stmts) => self.block(stmts),
            other => self.block(std::slice::from_ref(other)),
        }
    }

    fn fn_decl(&mut self, name: &str, params: &[String], defaults: &[Option<IrNode>], rest: Option<&str>, body: &IrNode) -> String {
        let mut parts: Vec<String> = params
            .iter()
            .zip(defaults.iter())
            .map(|(p, d)| match d {
                Some(expr) => format!("{p} = {}", self.expr(expr)),
                None => p.clone(),
            })
            .collect();
        if let Some(r) = rest {
            parts.push(format!("...{r}"));
        }
        format!("{}function {name}({}) {}", self.indent(), parts.join(", "), self.block_of(body))
    }

    /// `fx` prologue (spec §6): a variadic receiver that (a) unpacks a single
    /// object argument whose keys match parameter names, (b) falls back to
    /// positional assignment, (c) deep-copies each object parameter.
    fn fx_decl(&mut self, name: &str, params: &[String], defaults: &[Option<IrNode>], types: &[String], body: &IrNode) -> String {
        let header = format!("{}function {name}(...args) {{\n", self.indent());
        self.depth += 1;
        let inner_indent = self.indent();

        let mut decl = format!("{inner_indent}let {};\n", params.join(", "));

        let src = self.temp("src");
        let object_check = format!(
            "args.length === 1 && typeof args[0] === 'object' && args[0] !== null && !Array.isArray(args[0])"
        );
        decl.push_str(&format!("{inner_indent}if ({object_check}) {{\n"));
        self.depth += 1;
        let body_indent = self.indent();
        decl.push_str(&format!("{body_indent}const {src} = args[0];\n"));
        for (param, (default, ty)) in params.iter().zip(defaults.iter().zip(types.iter())) {
            let fallback = default.as_ref().map(|d| self.expr(d)).unwrap_or_else(|| "undefined".to_string());
            let raw = format!("(\"{param}\" in {src} ? {src}.{param} : {fallback})");
            let value = if is_primitive_type(ty) { raw } else { format!("structuredClone({raw})") };
            decl.push_str(&format!("{body_indent}{param} = {value};\n"));
        }
        self.depth -= 1;
        decl.push_str(&format!("{inner_indent}}} else {{\n"));
        self.depth += 1;
        let body_indent = self.indent();
        for (i, (param, (default, ty))) in params.iter().zip(defaults.iter().zip(types.iter())).enumerate() {
            let fallback = default.as_ref().map(|d| self.expr(d)).unwrap_or_else(|| "undefined".to_string());
            let raw = format!("(args[{i}] !== undefined ? args[{i}] : {fallback})");
            let value = if is_primitive_type(ty) { raw } else { format!("structuredClone({raw})") };
            decl.push_str(&format!("{body_indent}{param} = {value};\n"));
        }
        self.depth -= 1;
        decl.push_str(&format!("{inner_indent}}}\n"));

        let inner_body = match body {
            IrNode::BlockStatement(stmts) => stmts.iter().map(|s| self.stmt(s)).filter(|l| !l.is_empty()).collect::<Vec<_>>().join("\n"),
            other => self.stmt(other),
        };
        self.depth -= 1;
        let closing_indent = self.indent();
        format!("{header}{decl}{inner_body}\n{closing_indent}}}")
    }

    fn class_decl(&mut self, name: &str, fields: &[ClassField], constructor: &Option<ClassConstructor>, methods: &[ClassMethod]) -> String {
        self.depth += 1;
        let inner_indent = self.indent();
        let mut members = Vec::new();

        for field in fields {
            let line = match &field.init {
                Some(v) => format!("{inner_indent}{} = {};", field.name, self.expr(v)),
                None => format!("{inner_indent}{};", field.name),
            };
            members.push(line);
        }

        if let Some(ctor) = constructor {
            members.push(format!("{inner_indent}constructor({}) {}", ctor.params.join(", "), self.block_of(&ctor.body)));
        }

        for method in methods {
            let params: Vec<String> = method
                .params
                .iter()
                .zip(method.defaults.iter())
                .map(|(p, d)| match d {
                    Some(expr) => format!("{p} = {}", self.expr(expr)),
                    None => p.clone(),
                })
                .collect();
            members.push(format!("{inner_indent}{}({}) {}", method.name, params.join(", "), self.block_of(&method.body)));
        }

        self.depth -= 1;
        let closing_indent = self.indent();
        if members.is_empty() {
            format!("{}class {name} {{}}", closing_indent)
        } else {
            format!("{}class {name} {{\n{}\n{closing_indent}}}", closing_indent, members.join("\n\n"))
        }
    }

    /// Enums (spec §4.4.4 printer note): the IR doesn't mandate a concrete
    /// shape beyond carrying enough structure to build one. Bare and
    /// raw-valued cases become a frozen lookup object; associated-value
    /// cases become frozen factory functions tagging their payload with a
    /// `case` discriminant.
    fn enum_decl(&mut self, name: &str, raw_type: Option<&str>, cases: &[EnumCase]) -> String {
        let _ = raw_type;
        let indent = self.indent();
        let entries: Vec<String> = cases
            .iter()
            .map(|case| {
                if !case.associated.is_empty() {
                    let params: Vec<&str> = case.associated.iter().map(|(label, _)| label.as_str()).collect();
                    format!("{}: ({}) => ({{ case: \"{}\", {} }})", case.name, params.join(", "), case.name, params.join(", "))
                } else if let Some(raw) = &case.raw_value {
                    format!("{}: {}", case.name, self.expr(raw))
                } else {
                    format!("{}: \"{}\"", case.name, case.name)
                }
            })
            .collect();
        format!("{indent}const {name} = Object.freeze({{ {} }});", entries.join(", "))
    }

    fn js_import_reference(&mut self, namespace_name: &str, source: &str, default_name: Option<&str>) -> String {
        let indent = self.indent();
        let binding = default_name.unwrap_or(namespace_name);
        let key = self.temp("k");
        format!(
            "{indent}import * as {namespace_name} from \"{source}\";\n\
             {indent}const {binding} = Object.assign({{}}, {namespace_name}.default || {{}});\n\
             {indent}for (const {key} of Object.keys({namespace_name})) {{ if ({key} !== \"default\") {binding}[{key}] = {namespace_name}[{key}]; }}"
        )
    }

    // ---- expressions --------------------------------------------------

    fn expr(&mut self, node: &IrNode) -> String {
        match node {
            IrNode::StringLiteral(s) => format!("{:?}", s),
            IrNode::NumericLiteral(n) => format_number(*n),
            IrNode::BooleanLiteral(b) => b.to_string(),
            IrNode::NullLiteral => "null".to_string(),
            IrNode::Identifier(name) => name.clone(),
            IrNode::ArrayExpression(items) => format!("[{}]", items.iter().map(|i| self.expr(i)).collect::<Vec<_>>().join(", ")),
            IrNode::ObjectExpression(props) => format!("{{ {} }}", props.iter().map(|p| self.object_property(p)).collect::<Vec<_>>().join(", ")),
            IrNode::MemberExpression { object, property, computed } => {
                let obj = self.expr(object);
                if *computed {
                    format!("{obj}[{}]", self.expr(property))
                } else {
                    format!("{obj}.{}", self.expr(property))
                }
            }
            IrNode::CallExpression { callee, arguments } => format!("{}({})", self.expr(callee), self.args(arguments)),
            IrNode::NewExpression { callee, arguments } => format!("new {}({})", self.expr(callee), self.args(arguments)),
            IrNode::BinaryExpression { operator, left, right } => format!("({} {} {})", self.expr(left), operator, self.expr(right)),
            IrNode::UnaryExpression { operator, argument, prefix } => {
                if *prefix {
                    format!("({}{})", operator, self.expr(argument))
                } else {
                    format!("({}{})", self.expr(argument), operator)
                }
            }
            IrNode::ConditionalExpression { test, consequent, alternate } => {
                format!("({} ? {} : {})", self.expr(test), self.expr(consequent), self.expr(alternate))
            }
            IrNode::AssignmentExpression { operator, target, value } => format!("{} {} {}", self.expr(target), operator, self.expr(value)),
            IrNode::FunctionExpression { name, params, body } => {
                let label = name.as_deref().unwrap_or("");
                format!("function {label}({}) {}", params.join(", "), self.block_of(body))
            }
            IrNode::InteropIIFE { object, property, arguments } => self.interop_iife(object, property, arguments),
            IrNode::GetAndCall { object, method, arguments } => self.get_and_call(object, method, arguments),
            IrNode::Raw(text) => text.clone(),
            // Every remaining variant is statement-shaped; reaching here means
            // it's used in expression position (e.g. inside a quoted form),
            // which only happens for nodes that are always safe to inline.
            other => self.stmt(other),
        }
    }

    fn args(&mut self, arguments: &[IrNode]) -> String {
        arguments.iter().map(|a| self.expr(a)).collect::<Vec<_>>().join(", ")
    }

    fn object_property(&mut self, prop: &ObjectProperty) -> String {
        let value = self.expr(&prop.value);
        if prop.computed {
            format!("[{}]: {value}", prop.key)
        } else {
            format!("{}: {value}", prop.key)
        }
    }

    /// `(js-get-invoke obj prop arg…)` (spec §4.4.7): read the property once,
    /// then invoke it bound to the object if it's callable, else yield the
    /// value itself.
    fn interop_iife(&mut self, object: &IrNode, property: &str, arguments: &[IrNode]) -> String {
        let obj = self.expr(object);
        let obj_name = self.temp("obj");
        let val_name = self.temp("val");
        let args = self.args(arguments);
        format!(
            "(() => {{ const {obj_name} = {obj}; const {val_name} = {obj_name}[\"{property}\"]; return typeof {val_name} === 'function' ? {val_name}.call({obj_name}{}{}) : {val_name}; }})()",
            if args.is_empty() { "" } else { ", " },
            args
        )
    }

    /// `(method-call obj method arg…)` (spec §4.4.7): same safe-dispatch
    /// shape as `js-get-invoke`, but the method is looked up via a `get`
    /// runtime helper rather than direct property indexing.
    fn get_and_call(&mut self, object: &IrNode, method: &str, arguments: &[IrNode]) -> String {
        let obj = self.expr(object);
        let obj_name = self.temp("obj");
        let fn_name = self.temp("fn");
        let args = self.args(arguments);
        format!(
            "(() => {{ const {obj_name} = {obj}; const {fn_name} = get({obj_name}, \"{method}\"); return typeof {fn_name} === 'function' ? {fn_name}.call({obj_name}{}{}) : {fn_name}; }})()",
            if args.is_empty() { "" } else { ", " },
            args
        )
    }
}

fn variable_keyword(kind: VariableKind) -> &'static str {
    match kind {
        VariableKind::Const => "const",
        VariableKind::Let => "let",
        VariableKind::Var => "var",
    }
}

fn is_primitive_type(ty: &str) -> bool {
    PRIMITIVE_TYPES.contains(&ty)
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ImportSpecifier;

    #[test]
    fn binary_expression_prints_infix() {
        let node = IrNode::BinaryExpression { operator: "+".into(), left: Box::new(IrNode::ident("a")), right: Box::new(IrNode::NumericLiteral(1.0)) };
        assert_eq!(Printer::new().expr(&node), "(a + 1)");
    }

    #[test]
    fn fn_function_declaration_prints_default_params_and_rest() {
        let node = IrNode::FnFunctionDeclaration {
            name: "greet".into(),
            params: vec!["name".into(), "suffix".into()],
            defaults: vec![None, Some(IrNode::string("!"))],
            rest: Some("extras".into()),
            body: Box::new(IrNode::block(vec![IrNode::return_stmt(Some(IrNode::ident("name")))])),
        };
        let printed = print_program(&node);
        assert!(printed.contains("function greet(name, suffix = \"!\", ...extras)"));
        assert!(printed.contains("return name;"));
    }

    #[test]
    fn fx_function_declaration_emits_object_unpack_prologue() {
        let node = IrNode::FxFunctionDeclaration {
            name: "area".into(),
            params: vec!["w".into(), "h".into()],
            defaults: vec![None, None],
            param_types: vec!["Number".into(), "Number".into()],
            return_type: "Number".into(),
            body: Box::new(IrNode::block(vec![IrNode::return_stmt(Some(IrNode::BinaryExpression {
                operator: "*".into(),
                left: Box::new(IrNode::ident("w")),
                right: Box::new(IrNode::ident("h")),
            }))])),
        };
        let printed = print_program(&node);
        assert!(printed.contains("function area(...args)"));
        assert!(printed.contains("\"w\" in"));
        assert!(printed.contains("Array.isArray(args[0])"));
        assert!(printed.contains("return (w * h);"));
    }

    #[test]
    fn interop_iife_checks_callability_before_invoking() {
        let node = IrNode::InteropIIFE { object: Box::new(IrNode::ident("obj")), property: "maybe".into(), arguments: vec![] };
        let printed = Printer::new().expr(&node);
        assert!(printed.contains("typeof"));
        assert!(printed.contains("[\"maybe\"]"));
    }

    #[test]
    fn get_and_call_uses_get_runtime_helper() {
        let node = IrNode::GetAndCall { object: Box::new(IrNode::ident("obj")), method: "run".into(), arguments: vec![IrNode::NumericLiteral(1.0)] };
        let printed = Printer::new().expr(&node);
        assert!(printed.contains("get(") && printed.contains("\"run\""));
        assert!(printed.contains(".call("));
    }

    #[test]
    fn js_import_reference_wraps_namespace_with_default_merge() {
        let node = IrNode::JsImportReference { namespace_name: "ns".into(), source: "lib".into(), default_name: Some("lib".into()) };
        let printed = print_program(&node);
        assert!(printed.contains("import * as ns from \"lib\";"));
        assert!(printed.contains("const lib = Object.assign({}, ns.default || {});"));
        assert!(printed.contains("ns.default"));
    }

    #[test]
    fn import_declaration_aliases_distinct_local_names() {
        let node = IrNode::ImportDeclaration { specifiers: vec![ImportSpecifier { imported: "a".into(), local: "b".into() }], source: "mod".into() };
        assert_eq!(print_program(&node).trim(), "import { a as b } from \"mod\";");
    }

    #[test]
    fn bare_enum_prints_frozen_name_lookup() {
        let node = IrNode::EnumDeclaration {
            name: "Direction".into(),
            raw_type: None,
            cases: vec![EnumCase { name: "North".into(), raw_value: None, associated: Vec::new() }],
        };
        assert!(print_program(&node).contains("North: \"North\""));
    }

    #[test]
    fn associated_enum_case_prints_tagged_factory() {
        let node = IrNode::EnumDeclaration {
            name: "Shape".into(),
            raw_type: None,
            cases: vec![EnumCase { name: "circle".into(), raw_value: None, associated: vec![("radius".into(), "Double".into())] }],
        };
        let printed = print_program(&node);
        assert!(printed.contains("circle: (radius) => ({ case: \"circle\", radius })"));
    }

    #[test]
    fn class_constructor_and_fields_print_in_declared_order() {
        let node = IrNode::ClassDeclaration {
            name: "Point".into(),
            fields: vec![ClassField { name: "x".into(), mutable: true, init: Some(IrNode::NumericLiteral(0.0)) }],
            constructor: Some(ClassConstructor { params: vec!["x".into()], body: Box::new(IrNode::block(vec![IrNode::return_stmt(Some(IrNode::ident("this")))])) }),
            methods: vec![],
        };
        let printed = print_program(&node);
        assert!(printed.contains("x = 0;"));
        assert!(printed.contains("constructor(x) {"));
    }

    #[test]
    fn comment_block_elides_empty_text() {
        assert_eq!(print_program(&IrNode::CommentBlock(String::new())), "");
    }
}
