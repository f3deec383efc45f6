//! Compiles parsed Clay forms into type images.

use rustc_hash::FxHashSet;

use super::lexer::{Lexer, SourceLoc};
use super::parser::{Form, Parser};
use crate::image::{MethodImage, Op, TypeImage, Value, Visibility};

/// One compiler diagnostic, positioned in the unit it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub loc: SourceLoc,
    pub message: String,
}

impl Diagnostic {
    pub fn new(loc: SourceLoc, message: impl Into<String>) -> Self {
        Diagnostic {
            loc,
            message: message.into(),
        }
    }
}

/// Compile one source unit into zero or more type images.
///
/// A unit may declare several types; each becomes its own artifact. Any
/// diagnostic fails the whole unit, but compilation keeps going to collect
/// as many diagnostics as possible.
pub fn compile_unit(source: &str) -> Result<Vec<TypeImage>, Vec<Diagnostic>> {
    let tokens = Lexer::new(source).tokenize().map_err(|d| vec![d])?;
    let forms = Parser::new(tokens).parse_all().map_err(|d| vec![d])?;
    let mut compiler = UnitCompiler::default();
    let images: Vec<TypeImage> = forms
        .iter()
        .filter_map(|form| compiler.compile_deftype(form))
        .collect();
    if compiler.diagnostics.is_empty() {
        Ok(images)
    } else {
        Err(compiler.diagnostics)
    }
}

#[derive(Default)]
struct UnitCompiler {
    diagnostics: Vec<Diagnostic>,
}

impl UnitCompiler {
    fn error(&mut self, loc: SourceLoc, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::new(loc, message));
    }

    fn compile_deftype(&mut self, form: &Form) -> Option<TypeImage> {
        let Form::List(items, loc) = form else {
            self.error(form.loc(), "expected a (deftype ...) form");
            return None;
        };
        if items.first().and_then(Form::as_symbol) != Some("deftype") {
            self.error(*loc, "expected a (deftype ...) form");
            return None;
        }
        let Some(name) = items.get(1).and_then(Form::as_symbol) else {
            self.error(*loc, "deftype needs a qualified type name");
            return None;
        };

        let mut methods: Vec<MethodImage> = Vec::new();
        let mut seen = FxHashSet::default();
        for member in &items[2..] {
            if let Some(method) = self.compile_member(member) {
                if !seen.insert(method.name.clone()) {
                    self.error(
                        member.loc(),
                        format!("duplicate member name: {}", method.name),
                    );
                    continue;
                }
                methods.push(method);
            }
        }
        Some(TypeImage {
            name: name.to_string(),
            methods,
        })
    }

    fn compile_member(&mut self, form: &Form) -> Option<MethodImage> {
        let Form::List(items, loc) = form else {
            self.error(form.loc(), "expected a (method ...) form");
            return None;
        };
        let visibility = match items.first().and_then(Form::as_symbol) {
            Some("method") => Visibility::Public,
            Some("private-method") => Visibility::Private,
            _ => {
                self.error(*loc, "expected method or private-method");
                return None;
            }
        };
        let Some(name) = items.get(1).and_then(Form::as_symbol) else {
            self.error(*loc, "method needs a name");
            return None;
        };
        let Some(Form::List(param_forms, params_loc)) = items.get(2) else {
            self.error(*loc, "method needs a parameter list");
            return None;
        };

        let mut params: Vec<String> = Vec::new();
        for param in param_forms {
            let Some(param_name) = param.as_symbol() else {
                self.error(param.loc(), "parameter names must be symbols");
                return None;
            };
            if params.iter().any(|p| p == param_name) {
                self.error(param.loc(), format!("duplicate parameter: {}", param_name));
                return None;
            }
            params.push(param_name.to_string());
        }
        if params.len() > u8::MAX as usize {
            self.error(*params_loc, "too many parameters");
            return None;
        }

        if items.len() != 4 {
            self.error(*loc, "method takes exactly one body expression");
            return None;
        }
        let mut code = Vec::new();
        self.compile_expr(&items[3], &params, &mut code)?;
        code.push(Op::Ret);
        Some(MethodImage {
            name: name.to_string(),
            visibility,
            params,
            code,
        })
    }

    fn compile_expr(&mut self, form: &Form, params: &[String], code: &mut Vec<Op>) -> Option<()> {
        match form {
            Form::Integer(n, _) => code.push(Op::Const(Value::Int(*n))),
            Form::Bool(b, _) => code.push(Op::Const(Value::Bool(*b))),
            Form::Symbol(name, loc) => {
                let Some(index) = params.iter().position(|p| p == name) else {
                    self.error(*loc, format!("unknown identifier: {}", name));
                    return None;
                };
                code.push(Op::Arg(index as u8));
            }
            Form::List(items, loc) => {
                let Some(head) = items.first().and_then(Form::as_symbol) else {
                    self.error(*loc, "expected an operator");
                    return None;
                };
                match head {
                    "+" | "-" | "*" => self.compile_fold(head, items, params, code, *loc)?,
                    "<" | "=" => {
                        if items.len() != 3 {
                            self.error(*loc, format!("{} takes exactly two operands", head));
                            return None;
                        }
                        self.compile_expr(&items[1], params, code)?;
                        self.compile_expr(&items[2], params, code)?;
                        code.push(if head == "<" { Op::Lt } else { Op::Eq });
                    }
                    "if" => self.compile_if(items, params, code, *loc)?,
                    "call" => self.compile_call(items, params, code, *loc)?,
                    other => {
                        self.error(*loc, format!("unknown form: {}", other));
                        return None;
                    }
                }
            }
        }
        Some(())
    }

    /// Left-fold a variadic arithmetic operator over two or more operands.
    fn compile_fold(
        &mut self,
        head: &str,
        items: &[Form],
        params: &[String],
        code: &mut Vec<Op>,
        loc: SourceLoc,
    ) -> Option<()> {
        if items.len() < 3 {
            self.error(loc, format!("{} takes at least two operands", head));
            return None;
        }
        let op = match head {
            "+" => Op::Add,
            "-" => Op::Sub,
            _ => Op::Mul,
        };
        self.compile_expr(&items[1], params, code)?;
        for operand in &items[2..] {
            self.compile_expr(operand, params, code)?;
            code.push(op.clone());
        }
        Some(())
    }

    fn compile_if(
        &mut self,
        items: &[Form],
        params: &[String],
        code: &mut Vec<Op>,
        loc: SourceLoc,
    ) -> Option<()> {
        if items.len() != 4 {
            self.error(loc, "if takes a condition and two branches");
            return None;
        }
        self.compile_expr(&items[1], params, code)?;
        let branch = code.len();
        code.push(Op::JumpIfFalse(0));
        self.compile_expr(&items[2], params, code)?;
        let exit = code.len();
        code.push(Op::Jump(0));
        let else_target = self.jump_target(code.len(), loc)?;
        code[branch] = Op::JumpIfFalse(else_target);
        self.compile_expr(&items[3], params, code)?;
        let end_target = self.jump_target(code.len(), loc)?;
        code[exit] = Op::Jump(end_target);
        Some(())
    }

    fn compile_call(
        &mut self,
        items: &[Form],
        params: &[String],
        code: &mut Vec<Op>,
        loc: SourceLoc,
    ) -> Option<()> {
        let (Some(type_name), Some(member)) = (
            items.get(1).and_then(Form::as_symbol),
            items.get(2).and_then(Form::as_symbol),
        ) else {
            self.error(loc, "call takes a type name, a member name, and arguments");
            return None;
        };
        let args = &items[3..];
        if args.len() > u8::MAX as usize {
            self.error(loc, "too many call arguments");
            return None;
        }
        for arg in args {
            self.compile_expr(arg, params, code)?;
        }
        code.push(Op::Call {
            type_name: type_name.to_string(),
            member: member.to_string(),
            argc: args.len() as u8,
        });
        Some(())
    }

    fn jump_target(&mut self, index: usize, loc: SourceLoc) -> Option<u16> {
        match u16::try_from(index) {
            Ok(target) => Some(target),
            Err(_) => {
                self.error(loc, "method body is too large");
                None
            }
        }
    }
}
