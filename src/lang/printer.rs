use super::node::{Node, UnaryOp};
use super::precedence::{needs_parens_binary, needs_parens_loose, Precedence, Side};
use super::program::{Decl, FuncDef, SourceFile};

/// Line emitted at the top of the main file in split mode.
pub const LIBRARY_INCLUDE: &str = "#include \"stdlib.c\"";

/// Renders decompiled trees as C-like source text.
pub struct SourcePrinter {
    pub indent_width: usize,
}

impl Default for SourcePrinter {
    fn default() -> Self {
        Self { indent_width: 4 }
    }
}

impl SourcePrinter {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Documents
    // =========================================================================

    /// Globals, a blank line, then every function followed by a blank line.
    pub fn source(&self, file: &SourceFile) -> String {
        let mut out = self.globals(&file.globals);
        for func in &file.functions {
            out.push_str(&self.function(func));
            out.push('\n');
        }
        out
    }

    /// `(library, main)` pair. The library holds the globals and every
    /// function preceding `main`; the main file includes the library.
    pub fn split(&self, file: &SourceFile) -> (String, String) {
        let cut = file
            .functions
            .iter()
            .position(|f| f.name == "main")
            .unwrap_or(file.functions.len());

        let mut library = self.globals(&file.globals);
        for func in &file.functions[..cut] {
            library.push_str(&self.function(func));
            library.push('\n');
        }

        let mut main = format!("{}\n\n", LIBRARY_INCLUDE);
        for func in &file.functions[cut..] {
            main.push_str(&self.function(func));
            main.push('\n');
        }

        (library, main)
    }

    fn globals(&self, globals: &[Decl]) -> String {
        let mut out = String::new();
        for decl in globals {
            out.push_str(&self.decl(decl));
            out.push_str(";\n");
        }
        out.push('\n');
        out
    }

    pub fn function(&self, func: &FuncDef) -> String {
        let params: Vec<String> = func.params.iter().map(|p| self.decl(p)).collect();
        let mut out = format!("{} {}({}) {{\n", func.ret, func.name, params.join(", "));
        self.block(&func.body, 1, &mut out);
        out.push_str("}\n");
        out
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn block(&self, body: &[Node], depth: usize, out: &mut String) {
        for stmt in body {
            self.statement(stmt, depth, out);
        }
    }

    fn pad(&self, depth: usize) -> String {
        " ".repeat(depth * self.indent_width)
    }

    fn statement(&self, stmt: &Node, depth: usize, out: &mut String) {
        let pad = self.pad(depth);
        match stmt {
            Node::If { .. } => {
                out.push_str(&pad);
                self.if_chain(stmt, depth, out);
                out.push('\n');
            }
            Node::While { cond, body } => {
                out.push_str(&format!("{}while ({}) {{\n", pad, self.expr(cond)));
                self.block(body, depth + 1, out);
                out.push_str(&format!("{}}}\n", pad));
            }
            Node::DoWhile { cond, body } => {
                out.push_str(&format!("{}do {{\n", pad));
                self.block(body, depth + 1, out);
                out.push_str(&format!("{}}} while ({});\n", pad, self.expr(cond)));
            }
            Node::Label(name) => out.push_str(&format!("{}{}:\n", pad, name)),
            Node::Comment(text) if text.contains('\n') => {
                for line in text.lines() {
                    out.push_str(&format!("{}// {}\n", pad, line.trim_end()));
                }
            }
            Node::Comment(text) => out.push_str(&format!("{}/* {} */\n", pad, close_safe(text))),
            Node::Decl(decl) => out.push_str(&format!("{}{};\n", pad, self.decl(decl))),
            Node::Return(None) => out.push_str(&format!("{}return;\n", pad)),
            Node::Return(Some(value)) => {
                out.push_str(&format!("{}return {};\n", pad, self.expr(value)))
            }
            Node::Break => out.push_str(&format!("{}break;\n", pad)),
            Node::Continue => out.push_str(&format!("{}continue;\n", pad)),
            Node::Goto(name) => out.push_str(&format!("{}goto {};\n", pad, name)),
            expr => out.push_str(&format!("{}{};\n", pad, self.expr(expr))),
        }
    }

    /// Writes `if (..) { .. }` without leading padding or trailing newline,
    /// chaining a lone nested `if` in the else arm as `else if`.
    fn if_chain(&self, stmt: &Node, depth: usize, out: &mut String) {
        let pad = self.pad(depth);
        let Node::If {
            cond,
            then,
            otherwise,
        } = stmt
        else {
            return;
        };

        out.push_str(&format!("if ({}) {{\n", self.expr(cond)));
        self.block(then, depth + 1, out);
        out.push_str(&pad);
        out.push('}');

        match otherwise.as_deref() {
            None | Some([]) => {}
            Some([nested @ Node::If { .. }]) => {
                out.push_str(" else ");
                self.if_chain(nested, depth, out);
            }
            Some(arm) => {
                out.push_str(" else {\n");
                self.block(arm, depth + 1, out);
                out.push_str(&pad);
                out.push('}');
            }
        }
    }

    fn decl(&self, decl: &Decl) -> String {
        match &decl.init {
            Some(init) => format!("{} {} = {}", decl.ty, decl.name, self.expr(init)),
            None => format!("{} {}", decl.ty, decl.name),
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    pub fn expr(&self, node: &Node) -> String {
        match node {
            Node::Literal(value) => value.to_string(),
            Node::Id(name) => name.clone(),
            Node::Binary { op, lhs, rhs } => {
                let left = self.wrap(lhs, needs_parens_binary(*op, lhs, Side::Left));
                let right = self.wrap(rhs, needs_parens_binary(*op, rhs, Side::Right));
                format!("{} {} {}", left, op.symbol(), right)
            }
            Node::Unary { op, operand } if op.is_postfix() => {
                let inner = self.wrap(operand, operand.precedence() < Precedence::Postfix);
                format!("{}{}", inner, op.symbol())
            }
            Node::Unary { op, operand } => {
                let mut inner = self.wrap(operand, operand.precedence() < Precedence::Prefix);
                if *op == UnaryOp::Neg && inner.starts_with('-') {
                    inner = format!("({})", inner);
                }
                format!("{}{}", op.symbol(), inner)
            }
            Node::Cast { ty, expr } => {
                let inner = self.wrap(expr, expr.precedence() < Precedence::Prefix);
                format!("({}){}", ty, inner)
            }
            Node::Ternary {
                cond,
                then,
                otherwise,
            } => format!(
                "{} ? {} : {}",
                self.wrap(cond, needs_parens_loose(Precedence::Conditional, cond)),
                self.wrap(then, needs_parens_loose(Precedence::Conditional, then)),
                self.wrap(otherwise, needs_parens_loose(Precedence::Conditional, otherwise)),
            ),
            Node::Assign { op, target, value } => format!(
                "{} {} {}",
                self.wrap(target, target.precedence() < Precedence::Postfix),
                op.symbol(),
                self.wrap(value, needs_parens_loose(Precedence::Assign, value)),
            ),
            Node::Call { callee, args } => {
                let callee = self.wrap(callee, callee.precedence() < Precedence::Postfix);
                let args: Vec<String> = args.iter().map(|a| self.expr(a)).collect();
                format!("{}({})", callee, args.join(", "))
            }
            Node::Member { base, member } => {
                let base = self.wrap(base, base.precedence() < Precedence::Postfix);
                format!("{}.{}", base, member)
            }
            Node::Decl(decl) => self.decl(decl),
            Node::Comment(text) => format!("/* {} */", close_safe(&text.replace('\n', " "))),
            // control flow never appears in expression position
            other => {
                let mut out = String::new();
                self.statement(other, 0, &mut out);
                out.trim_end().to_string()
            }
        }
    }

    fn wrap(&self, node: &Node, parens: bool) -> String {
        if parens {
            format!("({})", self.expr(node))
        } else {
            self.expr(node)
        }
    }
}

/// Keep comment text from terminating its `/* */` early.
fn close_safe(text: &str) -> String {
    text.replace("*/", "* /")
}

/// Render a whole program with the default printer.
pub fn render_source(file: &SourceFile) -> String {
    SourcePrinter::new().source(file)
}

/// Render a program as a `(library, main)` pair with the default printer.
pub fn render_split(file: &SourceFile) -> (String, String) {
    SourcePrinter::new().split(file)
}

pub fn render_expr(node: &Node) -> String {
    SourcePrinter::new().expr(node)
}
