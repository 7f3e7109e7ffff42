//! The intermediate representation (spec §3): a tagged tree modeling
//! ECMAScript expressions and statements at design level. This is the
//! lowerer's sole output and the printer's sole input.
//!
//! IR nodes don't carry source spans: the core gives no source-map
//! guarantee (spec §1 Non-goals), and every `CodeGenError` the lowerer
//! raises is built from the *originating* `SExpr`'s span before the IR node
//! is ever constructed, so nothing downstream needs one.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableKind {
    Const,
    Let,
    Var,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectProperty {
    pub key: String,
    pub value: IrNode,
    pub computed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSpecifier {
    pub imported: String,
    pub local: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassField {
    pub name: String,
    pub mutable: bool,
    pub init: Option<IrNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassConstructor {
    pub params: Vec<String>,
    pub body: Box<IrNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMethod {
    pub name: String,
    pub is_fx: bool,
    pub params: Vec<String>,
    pub defaults: Vec<Option<IrNode>>,
    pub body: Box<IrNode>,
}

/// One `enum` case (spec §4.4.5): bare, raw-valued, or carrying a typed
/// associated-value payload. Exactly one of `raw_value`/`associated` is
/// populated, matching the "mixed declarations are forbidden" rule the
/// lowerer enforces before constructing this node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumCase {
    pub name: String,
    pub raw_value: Option<IrNode>,
    pub associated: Vec<(String, String)>,
}

/// The IR's tagged-tree node type (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IrNode {
    Program(Vec<IrNode>),

    StringLiteral(String),
    NumericLiteral(f64),
    BooleanLiteral(bool),
    NullLiteral,
    Identifier(String),

    ArrayExpression(Vec<IrNode>),
    ObjectExpression(Vec<ObjectProperty>),

    MemberExpression {
        object: Box<IrNode>,
        property: Box<IrNode>,
        computed: bool,
    },
    CallExpression {
        callee: Box<IrNode>,
        arguments: Vec<IrNode>,
    },
    NewExpression {
        callee: Box<IrNode>,
        arguments: Vec<IrNode>,
    },
    BinaryExpression {
        operator: String,
        left: Box<IrNode>,
        right: Box<IrNode>,
    },
    UnaryExpression {
        operator: String,
        argument: Box<IrNode>,
        prefix: bool,
    },
    ConditionalExpression {
        test: Box<IrNode>,
        consequent: Box<IrNode>,
        alternate: Box<IrNode>,
    },
    AssignmentExpression {
        operator: String,
        target: Box<IrNode>,
        value: Box<IrNode>,
    },

    FunctionExpression {
        name: Option<String>,
        params: Vec<String>,
        body: Box<IrNode>,
    },
    /// A generic function declaration, used for `lambda`-derived helpers and
    /// anywhere `fn`/`fx`'s richer call-site metadata doesn't apply.
    FunctionDeclaration {
        name: String,
        params: Vec<String>,
        body: Box<IrNode>,
    },
    FnFunctionDeclaration {
        name: String,
        params: Vec<String>,
        defaults: Vec<Option<IrNode>>,
        rest: Option<String>,
        body: Box<IrNode>,
    },
    FxFunctionDeclaration {
        name: String,
        params: Vec<String>,
        defaults: Vec<Option<IrNode>>,
        param_types: Vec<String>,
        return_type: String,
        body: Box<IrNode>,
    },

    ReturnStatement(Option<Box<IrNode>>),
    IfStatement {
        test: Box<IrNode>,
        consequent: Box<IrNode>,
        alternate: Option<Box<IrNode>>,
    },
    BlockStatement(Vec<IrNode>),
    VariableDeclaration {
        kind: VariableKind,
        name: String,
        init: Option<Box<IrNode>>,
    },

    ImportDeclaration {
        specifiers: Vec<ImportSpecifier>,
        source: String,
    },
    /// A non-HQL import (spec §4.2/§6): a namespace import plus a wrapper
    /// object copying every non-`default` export onto the module's
    /// `default` export.
    JsImportReference {
        namespace_name: String,
        source: String,
        default_name: Option<String>,
    },
    ExportNamedDeclaration {
        names: Vec<String>,
    },
    ExportVariableDeclaration {
        declaration: Box<IrNode>,
    },

    ClassDeclaration {
        name: String,
        fields: Vec<ClassField>,
        constructor: Option<ClassConstructor>,
        methods: Vec<ClassMethod>,
    },
    EnumDeclaration {
        name: String,
        raw_type: Option<String>,
        cases: Vec<EnumCase>,
    },

    /// Safe property-or-method access (spec §4.4.7, `js-get-invoke`): reads
    /// the property and, if callable, invokes it with the object as
    /// receiver; otherwise yields the value.
    InteropIIFE {
        object: Box<IrNode>,
        property: String,
        arguments: Vec<IrNode>,
    },
    /// Safe dynamic method dispatch (spec §4.4.7, `method-call`): look up
    /// `method` by name; if callable, call with the receiver as `this`;
    /// else return the value itself.
    GetAndCall {
        object: Box<IrNode>,
        method: String,
        arguments: Vec<IrNode>,
    },

    CommentBlock(String),
    /// Verbatim text passed through to the printer unchanged.
    Raw(String),
}

impl IrNode {
    pub fn string(s: impl Into<String>) -> Self {
        IrNode::StringLiteral(s.into())
    }

    pub fn ident(s: impl Into<String>) -> Self {
        IrNode::Identifier(s.into())
    }

    pub fn call(callee: IrNode, arguments: Vec<IrNode>) -> Self {
        IrNode::CallExpression { callee: Box::new(callee), arguments }
    }

    pub fn member(object: IrNode, property: IrNode, computed: bool) -> Self {
        IrNode::MemberExpression { object: Box::new(object), property: Box::new(property), computed }
    }

    pub fn block(stmts: Vec<IrNode>) -> Self {
        IrNode::BlockStatement(stmts)
    }

    pub fn return_stmt(value: Option<IrNode>) -> Self {
        IrNode::ReturnStatement(value.map(Box::new))
    }

    /// True for node kinds that are statements in ECMAScript rather than
    /// expressions; used by the lowerer to decide whether a block's final
    /// form needs wrapping in a `ReturnStatement` (spec §4.4.1).
    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            IrNode::ReturnStatement(_)
                | IrNode::IfStatement { .. }
                | IrNode::BlockStatement(_)
                | IrNode::VariableDeclaration { .. }
                | IrNode::FunctionDeclaration { .. }
                | IrNode::FnFunctionDeclaration { .. }
                | IrNode::FxFunctionDeclaration { .. }
                | IrNode::ClassDeclaration { .. }
                | IrNode::EnumDeclaration { .. }
                | IrNode::ImportDeclaration { .. }
                | IrNode::JsImportReference { .. }
                | IrNode::ExportNamedDeclaration { .. }
                | IrNode::ExportVariableDeclaration { .. }
                | IrNode::Program(_)
                | IrNode::CommentBlock(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_classification_matches_ecmascript_grammar() {
        assert!(IrNode::return_stmt(None).is_statement());
        assert!(!IrNode::string("x").is_statement());
        assert!(!IrNode::call(IrNode::ident("f"), vec![]).is_statement());
    }

    #[test]
    fn helper_constructors_build_expected_shapes() {
        let call = IrNode::call(IrNode::ident("console"), vec![IrNode::string("hi")]);
        match call {
            IrNode::CallExpression { callee, arguments } => {
                assert_eq!(*callee, IrNode::ident("console"));
                assert_eq!(arguments.len(), 1);
            }
            _ => panic!("expected CallExpression"),
        }
    }
}
