use std::fmt::{self, Write};

use crate::ast::{Mode, UNBOUNDED};
use crate::value::escape_json;

use super::JsonPath;
use super::kind::NodeKind;
use super::node::Node;

/// Writes the path back as text that parses to the same program.
pub(crate) fn print(path: &JsonPath, f: &mut impl Write) -> fmt::Result {
    if path.mode() == Mode::Strict {
        f.write_str("strict ")?;
    }

    print_chain(f, path.root(), true)
}

fn operation_name(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::And => "&&",
        NodeKind::Or => "||",
        NodeKind::Equal => "==",
        NodeKind::NotEqual => "!=",
        NodeKind::Less => "<",
        NodeKind::Greater => ">",
        NodeKind::LessOrEqual => "<=",
        NodeKind::GreaterOrEqual => ">=",
        NodeKind::StartsWith => "starts with",
        NodeKind::Add | NodeKind::Plus => "+",
        NodeKind::Sub | NodeKind::Minus => "-",
        NodeKind::Mul => "*",
        NodeKind::Div => "/",
        NodeKind::Mod => "%",
        _ => "",
    }
}

fn priority(kind: NodeKind) -> u8 {
    match kind {
        NodeKind::Or => 0,
        NodeKind::And => 1,
        NodeKind::Equal
        | NodeKind::NotEqual
        | NodeKind::Less
        | NodeKind::Greater
        | NodeKind::LessOrEqual
        | NodeKind::GreaterOrEqual
        | NodeKind::StartsWith => 2,
        NodeKind::Add | NodeKind::Sub => 3,
        NodeKind::Mul | NodeKind::Div | NodeKind::Mod => 4,
        NodeKind::Plus | NodeKind::Minus => 5,
        _ => 6,
    }
}

/// Kinds whose text can be followed directly by `.key`, `[...]` or `?(...)`.
fn takes_accessors(kind: NodeKind) -> bool {
    !(kind.binary_op().is_some()
        || kind.unary_op().is_some()
        || kind == NodeKind::Sequence)
}

fn print_chain(f: &mut impl Write, node: Node<'_>, brackets: bool) -> fmt::Result {
    if node.has_next() && !takes_accessors(node.kind()) {
        f.write_char('(')?;
        print_node(f, node, false, false)?;
        f.write_char(')')?;
    } else {
        print_node(f, node, false, brackets)?;
    }

    for step in node.steps().skip(1) {
        print_node(f, step, true, true)?;
    }

    Ok(())
}

/// An argument in a delimited position: only a bare sequence needs parentheses.
fn print_operand(f: &mut impl Write, node: Node<'_>) -> fmt::Result {
    print_chain(f, node, node.kind() == NodeKind::Sequence)
}

fn print_list<'p>(
    f: &mut impl Write,
    nodes: impl Iterator<Item = Node<'p>>,
    separator: &str,
) -> fmt::Result {
    for (i, node) in nodes.enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        print_operand(f, node)?;
    }
    Ok(())
}

fn print_node(f: &mut impl Write, node: Node<'_>, in_key: bool, brackets: bool) -> fmt::Result {
    let kind = node.kind();

    match kind {
        NodeKind::Null => f.write_str("null"),
        NodeKind::Bool => f.write_str(if node.as_bool() { "true" } else { "false" }),
        NodeKind::Numeric => write!(f, "{}", node.as_numeric()),
        NodeKind::String => escape_json(f, node.as_str()),
        NodeKind::Variable => {
            f.write_char('$')?;
            escape_json(f, node.as_str())
        }
        NodeKind::Root => f.write_char('$'),
        NodeKind::Current => f.write_char('@'),
        NodeKind::Last => f.write_str("last"),
        NodeKind::Argument => write!(f, "@{}", node.argument_index()),
        NodeKind::Key => {
            if in_key {
                f.write_char('.')?;
            }
            escape_json(f, node.as_str())
        }
        NodeKind::AnyKey => {
            if in_key {
                f.write_char('.')?;
            }
            f.write_char('*')
        }
        NodeKind::AnyArray => f.write_str("[*]"),
        NodeKind::Any => {
            if in_key {
                f.write_char('.')?;
            }
            f.write_str("**")?;
            match node.bounds() {
                (0, UNBOUNDED) => Ok(()),
                (0, last) => write!(f, "{{,{}}}", last),
                (first, UNBOUNDED) => write!(f, "{{{},}}", first),
                (first, last) if first == last => write!(f, "{{{}}}", first),
                (first, last) => write!(f, "{{{},{}}}", first, last),
            }
        }
        NodeKind::Index => {
            f.write_char('[')?;
            for (i, (from, to)) in node.subscripts().enumerate() {
                if i > 0 {
                    f.write_char(',')?;
                }
                print_operand(f, from)?;
                if let Some(to) = to {
                    f.write_str(" to ")?;
                    print_operand(f, to)?;
                }
            }
            f.write_char(']')
        }
        NodeKind::And
        | NodeKind::Or
        | NodeKind::Equal
        | NodeKind::NotEqual
        | NodeKind::Less
        | NodeKind::Greater
        | NodeKind::LessOrEqual
        | NodeKind::GreaterOrEqual
        | NodeKind::StartsWith
        | NodeKind::Add
        | NodeKind::Sub
        | NodeKind::Mul
        | NodeKind::Div
        | NodeKind::Mod => {
            if brackets {
                f.write_char('(')?;
            }
            print_nested(f, node.left(), kind)?;
            write!(f, " {} ", operation_name(kind))?;
            print_nested(f, node.right(), kind)?;
            if brackets {
                f.write_char(')')?;
            }
            Ok(())
        }
        NodeKind::Plus | NodeKind::Minus => {
            if brackets {
                f.write_char('(')?;
            }
            f.write_str(operation_name(kind))?;
            print_nested(f, node.arg(), kind)?;
            if brackets {
                f.write_char(')')?;
            }
            Ok(())
        }
        NodeKind::Not => {
            f.write_str("!(")?;
            print_operand(f, node.arg())?;
            f.write_char(')')
        }
        NodeKind::IsUnknown => {
            f.write_char('(')?;
            print_operand(f, node.arg())?;
            f.write_str(") is unknown")
        }
        NodeKind::Exists => {
            f.write_str("exists (")?;
            print_operand(f, node.arg())?;
            f.write_char(')')
        }
        NodeKind::Filter => {
            f.write_str("?(")?;
            print_operand(f, node.arg())?;
            f.write_char(')')
        }
        NodeKind::Type
        | NodeKind::Size
        | NodeKind::Abs
        | NodeKind::Floor
        | NodeKind::Ceiling
        | NodeKind::Double
        | NodeKind::KeyValue
        | NodeKind::Min
        | NodeKind::Max => match kind.method() {
            Some(method) => write!(f, ".{}()", method.name()),
            None => Ok(()),
        },
        NodeKind::Datetime => {
            f.write_str(".datetime(")?;
            if let Some(template) = node.template() {
                print_operand(f, template)?;
            }
            f.write_char(')')
        }
        NodeKind::Map => {
            f.write_str(".map(")?;
            print_operand(f, node.arg())?;
            f.write_char(')')
        }
        NodeKind::Reduce => {
            f.write_str(".reduce(")?;
            print_operand(f, node.arg())?;
            f.write_char(')')
        }
        NodeKind::Fold | NodeKind::FoldLeft | NodeKind::FoldRight => {
            if let Some(fold) = kind.fold() {
                write!(f, ".{}(", fold.name())?;
            }
            print_operand(f, node.left())?;
            f.write_str(", ")?;
            print_operand(f, node.right())?;
            f.write_char(')')
        }
        NodeKind::Array => {
            f.write_char('[')?;
            print_list(f, node.elements(), ", ")?;
            f.write_char(']')
        }
        NodeKind::Object => {
            f.write_char('{')?;
            for (i, (key, value)) in node.fields().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                print_operand(f, key)?;
                f.write_str(": ")?;
                print_operand(f, value)?;
            }
            f.write_char('}')
        }
        NodeKind::Sequence => {
            if brackets {
                f.write_char('(')?;
            }
            print_list(f, node.elements(), ", ")?;
            if brackets {
                f.write_char(')')?;
            }
            Ok(())
        }
    }
}

/// An operand of an operator: parenthesised when it binds no tighter than the operator.
fn print_nested(f: &mut impl Write, node: Node<'_>, parent: NodeKind) -> fmt::Result {
    let brackets = node.kind() == NodeKind::Sequence || priority(node.kind()) <= priority(parent);
    print_chain(f, node, brackets)
}
