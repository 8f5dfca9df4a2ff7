//! AST → code template generation.
//!
//! Every value rule returns the value's [`Type`] and the [`Item`] where it
//! now lives: either an inline literal or a variable some emitted block has
//! written. Computed values are written into a destination picked by the
//! caller, which is the assigned variable for definitions and assignments and
//! a fresh line-scoped temporary everywhere else.

use log::debug;

use super::ast::*;
use super::env::{Environment, Signature};
use super::error::CompileError;
use super::types::{compare, compare_simple, Compat, Entry, EntryKey, Type, TypeName};
use crate::schema::ActionSchema;
use crate::template::{Codeblock, Codeline, Item, ItemKind, Program};

const SET_VAR: &str = "set_var";
const FUNC: &str = "func";
const CALL_FUNC: &str = "call_func";

/// Generate the program for `defs` against `schema`.
pub fn generate(defs: &Definitions, schema: &ActionSchema) -> Result<Program, CompileError> {
    let mut generator = Generator::new(schema);
    for def in &defs.definitions {
        match def {
            Definition::Var(var) => generator.define_global(var)?,
            Definition::Func(func) => generator.gen_function(func)?,
        }
    }
    Ok(Program {
        lines: generator.lines,
    })
}

type Value = (Type, Item);

/// Where a computed value should be written.
enum Dest<'a> {
    Var { name: &'a str, scope: &'static str },
    Temp(&'static str),
}

/// One parameter as seen by the argument cursor.
struct ParamCheck {
    expected: Expected,
    plural: bool,
    optional: bool,
}

enum Expected {
    /// User function parameter, compared structurally.
    Declared(Type),
    /// Native argument descriptor such as `NUMBER` or `VARIABLE`.
    Native(String),
}

impl ParamCheck {
    fn accepts(&self, arg: &Expr, ty: &Type) -> bool {
        match &self.expected {
            Expected::Declared(expected) => expected.accepts(ty),
            Expected::Native(code) => {
                (code == "VARIABLE" && matches!(arg.kind, ExprKind::Variable(_)))
                    || compare_simple(code, ty.name.argument_code())
            }
        }
    }

    fn describe(&self) -> String {
        match &self.expected {
            Expected::Declared(ty) => ty.to_string(),
            Expected::Native(code) => TypeName::from_argument_code(code)
                .map_or_else(|| code.clone(), |t| t.as_str().to_string()),
        }
    }
}

struct Generator<'s> {
    schema: &'s ActionSchema,
    env: Environment,
    lines: Vec<Codeline>,
    current: Codeline,
    temp_counter: usize,
}

impl<'s> Generator<'s> {
    fn new(schema: &'s ActionSchema) -> Self {
        Self {
            schema,
            env: Environment::new(),
            lines: Vec::new(),
            current: Codeline::default(),
            temp_counter: 0,
        }
    }

    // ── Definitions ───────────────────────────────────────────────

    fn define_global(&mut self, var: &VarDef) -> Result<(), CompileError> {
        if var.value.is_some() {
            return Err(CompileError::semantic(
                format!("Global variable '{}' cannot have an initializer", var.name),
                var.span,
            ));
        }
        self.env.define(&var.name, var.ty.clone(), var.scope);
        Ok(())
    }

    fn gen_function(&mut self, func: &FuncDef) -> Result<(), CompileError> {
        self.env.define_function(Signature {
            name: func.name.clone(),
            params: func.params.clone(),
        });

        let Some(body) = &func.body else {
            return Ok(());
        };

        self.current = Codeline::default();
        self.temp_counter = 0;
        self.env.push_frame();
        let result = self.gen_function_body(func, body);
        self.env.pop_frame();
        result?;

        debug!(
            "generated function '{}' ({} blocks)",
            func.name,
            self.current.blocks.len()
        );
        self.lines.push(std::mem::take(&mut self.current));
        Ok(())
    }

    fn gen_function_body(&mut self, func: &FuncDef, body: &[Stmt]) -> Result<(), CompileError> {
        let mut params = Vec::with_capacity(func.params.len());
        for (i, param) in func.params.iter().enumerate() {
            let code = param.ty.name.parameter_code().ok_or_else(|| {
                CompileError::semantic(
                    format!(
                        "Parameter '{}' of function '{}' cannot have type '{}'",
                        param.name, func.name, param.ty
                    ),
                    func.span,
                )
            })?;

            let ty = if param.plural {
                Type::list_of(param.ty.clone())
            } else {
                param.ty.clone()
            };
            self.env.define(&param.name, ty, ScopeKind::Line);

            params.push(Item::new(ItemKind::Parameter {
                name: param.name.clone(),
                ty: if param.output { "var" } else { code }.to_string(),
                optional: param.optional,
                plural: param.plural,
                description: param
                    .description
                    .clone()
                    .unwrap_or_else(|| format!("Argument #{}", i + 1)),
            }));
        }

        let block = self.block(FUNC, None, params, func.span)?.with_data(&func.name);
        self.current.push(block);

        for stmt in body {
            self.gen_stmt(stmt)?;
        }
        Ok(())
    }

    // ── Statements ────────────────────────────────────────────────

    fn gen_stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::Var(var) => {
                self.env.define(&var.name, var.ty.clone(), var.scope);
                if let Some(value) = &var.value {
                    self.assign_into(&var.name, var.scope, &var.ty, value, var.span)?;
                }
                Ok(())
            }
            Stmt::Expr(expr) => match &expr.kind {
                ExprKind::Assign { name, value } => {
                    let binding = self.env.get(name).cloned().ok_or_else(|| {
                        CompileError::semantic(
                            format!("Assigning an undefined variable '{name}'"),
                            expr.span,
                        )
                    })?;
                    self.assign_into(name, binding.scope, &binding.ty, value, expr.span)
                }
                ExprKind::SetIndex {
                    object,
                    index,
                    value,
                } => self.gen_set_index(object, index, value, expr.span),
                ExprKind::Call { name, args } => self.gen_call(name, args, expr.span),
                ExprKind::Action { action, args } => self.gen_action(action, args, expr.span),
                _ => Err(CompileError::semantic(
                    "Expected statement, got expression",
                    expr.span,
                )),
            },
        }
    }

    /// Write `value` into the variable `name`, copying with `=` only when the
    /// value did not land there directly.
    fn assign_into(
        &mut self,
        name: &str,
        scope: ScopeKind,
        declared: &Type,
        value: &Expr,
        span: Span,
    ) -> Result<(), CompileError> {
        let scope = scope.wire_name();
        let (ty, item) = self.gen_value(value, &Dest::Var { name, scope })?;

        match compare(declared, &ty) {
            Compat::Yes => {}
            Compat::No => {
                return Err(CompileError::semantic(
                    format!("Assigning a value of type '{ty}' to variable defined as '{declared}'"),
                    span,
                ))
            }
            Compat::Entry { key, ty: entry_ty } => {
                return Err(CompileError::semantic(
                    format!(
                        "Assigning a value of type '{ty}' to variable defined as '{declared}' (entry {key} has type '{entry_ty}')"
                    ),
                    span,
                ))
            }
        }

        if item.as_variable() != Some((name, scope)) {
            self.set_var("=", vec![Item::variable(name, scope), item], span)?;
        }
        Ok(())
    }

    fn gen_set_index(
        &mut self,
        object: &Expr,
        index: &Expr,
        value: &Expr,
        span: Span,
    ) -> Result<(), CompileError> {
        let (obj_ty, obj_item) = self.gen_value(object, &Dest::Temp("__obj"))?;
        if !matches!(obj_ty.name, TypeName::Dict | TypeName::List) {
            return Err(CompileError::semantic(
                format!("Cannot index into object of type '{obj_ty}'"),
                object.span,
            ));
        }

        let (idx_ty, idx_item) = self.gen_value(index, &Dest::Temp("__idx"))?;
        let (value_ty, value_item) = self.gen_value(value, &Dest::Temp("__value"))?;
        self.check_key(&obj_ty, &idx_ty, index.span)?;

        let element = obj_ty.element_type();
        if !element.accepts(&value_ty) {
            let container = if obj_ty.is(TypeName::Dict) {
                "Dictionary"
            } else {
                "List"
            };
            return Err(CompileError::semantic(
                format!("{container} expected value of type '{element}' but instead got '{value_ty}'"),
                value.span,
            ));
        }

        let action = if obj_ty.is(TypeName::Dict) {
            "SetDictValue"
        } else {
            "SetListValue"
        };
        self.set_var(action, vec![obj_item, idx_item, value_item], span)
    }

    fn check_key(&self, obj_ty: &Type, idx_ty: &Type, span: Span) -> Result<(), CompileError> {
        let (container, key) = match obj_ty.name {
            TypeName::Dict => ("dictionary", TypeName::Str),
            TypeName::List => ("list", TypeName::Num),
            _ => return Ok(()),
        };
        if idx_ty.is(key) {
            Ok(())
        } else {
            Err(CompileError::semantic(
                format!("Cannot index into {container} with key of type '{idx_ty}' (must be a {key})"),
                span,
            ))
        }
    }

    // ── Calls ─────────────────────────────────────────────────────

    fn gen_call(&mut self, name: &str, args: &[Expr], span: Span) -> Result<(), CompileError> {
        let signature = self
            .env
            .get_function(name)
            .cloned()
            .ok_or_else(|| CompileError::semantic(format!("Undefined function '{name}'"), span))?;

        if signature.params.is_empty() && !args.is_empty() {
            return Err(CompileError::semantic(
                format!("Function '{name}' takes no arguments"),
                span,
            ));
        }

        let params: Vec<ParamCheck> = signature
            .params
            .iter()
            .map(|p| ParamCheck {
                expected: Expected::Declared(p.ty.clone()),
                plural: p.plural,
                optional: p.optional,
            })
            .collect();
        let items = self.resolve_args(args, &params, "Function", span)?;

        let block = self.block(CALL_FUNC, None, items, span)?.with_data(name);
        self.current.push(block);
        Ok(())
    }

    fn gen_action(&mut self, action: &ActionRef, args: &[Expr], span: Span) -> Result<(), CompileError> {
        let schema = self.schema;
        let spec = schema
            .action(&action.category, &action.action)
            .map_err(|e| CompileError::semantic(e.to_string(), span))?;
        let identifier = schema
            .identifier_of(&action.category)
            .map_err(|e| CompileError::semantic(e.to_string(), span))?;

        if spec.arguments.is_empty() && !args.is_empty() {
            return Err(CompileError::semantic(
                format!("Action '{}' takes no arguments", action.action),
                span,
            ));
        }

        let params: Vec<ParamCheck> = spec
            .arguments
            .iter()
            .map(|a| ParamCheck {
                expected: Expected::Native(a.ty.clone()),
                plural: a.plural,
                optional: a.optional,
            })
            .collect();
        let items = self.resolve_args(args, &params, "Codeblock", span)?;

        let block = self
            .block(identifier, Some(&action.action), items, span)?
            .with_target(action.target.map(Target::wire_name));
        self.current.push(block);
        Ok(())
    }

    /// Match call arguments to parameters with a single forward-only cursor.
    ///
    /// A non-plural parameter that is not last is left behind before each new
    /// argument; a plural or last parameter keeps absorbing. On a mismatch an
    /// optional or plural parameter may be skipped once. Parameters the cursor
    /// never reached must all be optional.
    fn resolve_args(
        &mut self,
        args: &[Expr],
        params: &[ParamCheck],
        label: &str,
        span: Span,
    ) -> Result<Vec<Item>, CompileError> {
        let last = params.len().saturating_sub(1);
        let mut cursor: Option<usize> = None;
        let mut items = Vec::with_capacity(args.len());

        let mismatch = |i: usize, param: &ParamCheck, ty: &Type| {
            CompileError::semantic(
                format!(
                    "{label} parameter #{} expected '{}' but got '{ty}'",
                    i + 1,
                    param.describe()
                ),
                span,
            )
        };

        for (i, arg) in args.iter().enumerate() {
            let (ty, item) = self.gen_value(arg, &Dest::Temp("__carg"))?;

            let mut at = match cursor {
                Some(c) if c == last || params.get(c).is_some_and(|p| p.plural) => c,
                Some(c) => c + 1,
                None => 0,
            };
            let Some(mut param) = params.get(at) else {
                return Err(CompileError::semantic(
                    format!("{label} takes no arguments"),
                    span,
                ));
            };

            if !param.accepts(arg, &ty) {
                if (param.plural || param.optional) && at != last {
                    at += 1;
                    param = params.get(at).ok_or_else(|| mismatch(i, param, &ty))?;
                    if !param.accepts(arg, &ty) {
                        return Err(mismatch(i, param, &ty));
                    }
                } else {
                    return Err(mismatch(i, param, &ty));
                }
            }

            cursor = Some(at);
            items.push(item.at(i));
        }

        let first_unreached = cursor.map_or(0, |c| c + 1);
        if let Some((j, missing)) = params
            .iter()
            .enumerate()
            .skip(first_unreached)
            .find(|(_, p)| !p.optional)
        {
            return Err(CompileError::semantic(
                format!(
                    "{label} parameter #{} expected '{}' but got no argument",
                    j + 1,
                    missing.describe()
                ),
                span,
            ));
        }

        Ok(items)
    }

    // ── Values ────────────────────────────────────────────────────

    fn gen_value(&mut self, expr: &Expr, dest: &Dest<'_>) -> Result<Value, CompileError> {
        match &expr.kind {
            ExprKind::Number(n) => Ok((Type::num(), Item::new(ItemKind::Number(*n)))),
            ExprKind::Str(s) => Ok((
                Type::simple(TypeName::Str),
                Item::new(ItemKind::String(s.clone())),
            )),
            ExprKind::StyledText(s) => Ok((
                Type::simple(TypeName::Txt),
                Item::new(ItemKind::StyledText(s.clone())),
            )),
            ExprKind::Vector { x, y, z } => Ok((
                Type::simple(TypeName::Vec),
                Item::new(ItemKind::Vector {
                    x: *x,
                    y: *y,
                    z: *z,
                }),
            )),
            ExprKind::Variable(name) => {
                let binding = self.env.get(name).ok_or_else(|| {
                    CompileError::semantic(format!("Undefined variable '{name}'"), expr.span)
                })?;
                Ok((
                    binding.ty.clone(),
                    Item::variable(name, binding.scope.wire_name()),
                ))
            }
            ExprKind::Dict(entries) => self.gen_dict(entries, dest, expr.span),
            ExprKind::List(elements) => self.gen_list(elements, dest, expr.span),
            ExprKind::Binary {
                op,
                op_span,
                left,
                right,
            } => {
                let (left_ty, left_item) = self.gen_value(left, &Dest::Temp("__bin_l"))?;
                let (right_ty, right_item) = self.gen_value(right, &Dest::Temp("__bin_r"))?;
                if !left_ty.is(TypeName::Num) || !right_ty.is(TypeName::Num) {
                    return Err(CompileError::semantic(
                        "Currently only numbers are supported for binary operations",
                        *op_span,
                    ));
                }
                let target = self.place(dest);
                self.set_var(
                    op.action_name(),
                    vec![target.clone(), left_item, right_item],
                    expr.span,
                )?;
                Ok((Type::num(), target))
            }
            ExprKind::Index { object, index } => self.gen_index(object, index, dest, expr.span),
            ExprKind::Cast { ty, value } => {
                let (value_ty, item) = self.gen_value(value, dest)?;
                let mut cast = ty.clone();
                cast.entries = value_ty.entries;
                Ok((cast, item))
            }
            ExprKind::Assign { .. }
            | ExprKind::SetIndex { .. }
            | ExprKind::Call { .. }
            | ExprKind::Action { .. } => Err(CompileError::semantic(
                "Expression does not produce a value",
                expr.span,
            )),
        }
    }

    fn gen_index(
        &mut self,
        object: &Expr,
        index: &Expr,
        dest: &Dest<'_>,
        span: Span,
    ) -> Result<Value, CompileError> {
        let (obj_ty, obj_item) = self.gen_value(object, &Dest::Temp("__obj"))?;
        if !matches!(obj_ty.name, TypeName::Str | TypeName::Dict | TypeName::List) {
            return Err(CompileError::semantic(
                format!("Cannot index into object of type '{obj_ty}'"),
                object.span,
            ));
        }

        let (idx_ty, idx_item) = self.gen_value(index, &Dest::Temp("__idx"))?;
        self.check_key(&obj_ty, &idx_ty, index.span)?;

        let action = match obj_ty.name {
            TypeName::Dict => "GetDictValue",
            TypeName::List => "GetListValue",
            _ => {
                return Err(CompileError::semantic(
                    format!("Indexing into a '{obj_ty}' is not implemented"),
                    span,
                ))
            }
        };

        let target = self.place(dest);
        self.set_var(action, vec![target.clone(), obj_item, idx_item], span)?;
        Ok((obj_ty.element_type(), target))
    }

    fn gen_dict(
        &mut self,
        entries: &[(String, Expr)],
        dest: &Dest<'_>,
        span: Span,
    ) -> Result<Value, CompileError> {
        let mut values = Vec::with_capacity(entries.len());
        let mut recorded = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let (ty, item) = self.gen_value(value, &Dest::Temp("__dict"))?;
            recorded.push(Entry {
                key: EntryKey::Key(key.clone()),
                ty,
            });
            values.push((key, item));
        }

        let target = self.place(dest);
        self.set_var("CreateDict", vec![target.clone()], span)?;
        for (key, item) in values {
            self.set_var(
                "SetDictValue",
                vec![
                    target.clone(),
                    Item::new(ItemKind::String(key.clone())),
                    item,
                ],
                span,
            )?;
        }

        let ty = Type::new(TypeName::Dict, vec![Type::any()]).with_entries(recorded);
        Ok((ty, target))
    }

    fn gen_list(&mut self, elements: &[Expr], dest: &Dest<'_>, span: Span) -> Result<Value, CompileError> {
        let mut items = Vec::with_capacity(elements.len());
        let mut recorded = Vec::with_capacity(elements.len());
        for (i, element) in elements.iter().enumerate() {
            let (ty, item) = self.gen_value(element, &Dest::Temp("__list"))?;
            recorded.push(Entry {
                key: EntryKey::Position(i),
                ty,
            });
            items.push(item);
        }

        let target = self.place(dest);
        let mut args = Vec::with_capacity(items.len() + 1);
        args.push(target.clone());
        args.extend(items);
        self.set_var("CreateList", args, span)?;

        let ty = Type::list_of(Type::any()).with_entries(recorded);
        Ok((ty, target))
    }

    // ── Emission ──────────────────────────────────────────────────

    /// Variable item for a computed value.
    fn place(&mut self, dest: &Dest<'_>) -> Item {
        match dest {
            Dest::Var { name, scope } => Item::variable(*name, *scope),
            Dest::Temp(hint) => {
                let n = self.temp_counter;
                self.temp_counter += 1;
                Item::variable(format!("{hint}{n}"), ScopeKind::Line.wire_name())
            }
        }
    }

    fn block(
        &self,
        kind: &str,
        action: Option<&str>,
        args: Vec<Item>,
        span: Span,
    ) -> Result<Codeblock, CompileError> {
        let args = args
            .into_iter()
            .enumerate()
            .map(|(slot, item)| item.at(slot))
            .collect();
        Codeblock::new(self.schema, kind, action, args)
            .map_err(|e| CompileError::semantic(e.to_string(), span))
    }

    fn set_var(&mut self, action: &str, args: Vec<Item>, span: Span) -> Result<(), CompileError> {
        let block = self.block(SET_VAR, Some(action), args, span)?;
        self.current.push(block);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::super::{lexer::lex, parser::parse};
    use super::*;
    use crate::schema::tests::fixture;
    use crate::template::encode;

    fn compile(src: &str) -> Result<Program, CompileError> {
        let defs = parse(lex(src).unwrap()).unwrap();
        generate(&defs, &fixture())
    }

    fn compile_ok(src: &str) -> Program {
        compile(src).unwrap()
    }

    fn compile_err(src: &str) -> String {
        compile(src).unwrap_err().message
    }

    fn var(item: &Item) -> (&str, &str) {
        item.as_variable().unwrap()
    }

    #[test]
    fn end_to_end_binary_definition() {
        let program = compile_ok("func main() { var x: num = 1 + 2; }");
        assert_eq!(program.lines.len(), 1);
        let blocks = &program.lines[0].blocks;
        assert_eq!(blocks.len(), 2);

        assert_eq!(blocks[0].kind, "func");
        assert_eq!(blocks[0].data.as_deref(), Some("main"));
        assert!(blocks[0].args.is_empty());

        let add = &blocks[1];
        assert_eq!(add.kind, "set_var");
        assert_eq!(add.action.as_deref(), Some("+"));
        assert_eq!(add.args.len(), 3);
        assert_eq!(var(&add.args[0]), ("x", "line"));
        assert_eq!(add.args[0].slot, 0);
        assert_eq!(add.args[1], Item::new(ItemKind::Number(1.0)).at(1));
        assert_eq!(add.args[2], Item::new(ItemKind::Number(2.0)).at(2));
    }

    #[test]
    fn encoded_program_decodes_to_generated_json() {
        let schema = fixture();
        let defs = parse(lex("func main() { var x: num = 1 / 2; }").unwrap()).unwrap();
        let program = generate(&defs, &schema).unwrap();
        let line = &program.lines[0];
        let json = line.to_json(&schema).unwrap();
        assert_eq!(encode::decode(&line.encode(&schema).unwrap()).unwrap(), json);
        // Division carries a schema tag after the user arguments.
        let items = json["blocks"][1]["args"]["items"].as_array().unwrap();
        assert_eq!(items.len(), 4);
        assert_eq!(items[3]["item"]["id"], "bl_tag");
        assert_eq!(items[3]["slot"], 3);
    }

    #[test]
    fn serialized_slots_are_contiguous() {
        let schema = fixture();
        let program = compile_ok(
            r#"func f(a: num, b: num..., c: str?);
               func main() {
                   local l: list<any> = [1, "two", <1, 2, 3>];
                   var d: dict<any> = {"a": 1 + 2, "b": l[0]};
                   f(1, 2, 3, "x");
                   codeblock "SendMessage" <"PLAYER ACTION">(`a`, `b`);
                   local n: num = 4;
                   var q: num = n / 2;
               }"#,
        );
        let line = program.lines[0].to_json(&schema).unwrap();
        for block in line["blocks"].as_array().unwrap() {
            let items = block["args"]["items"].as_array().unwrap();
            let mut slots: Vec<u64> = items.iter().map(|i| i["slot"].as_u64().unwrap()).collect();
            slots.sort_unstable();
            let expected: Vec<u64> = (0..items.len() as u64).collect();
            assert_eq!(slots, expected, "block {block}");
        }
    }

    #[test]
    fn plural_and_optional_resolution() {
        let header = "func f(a: num, b: num..., c: str?);\n";
        assert!(compile(&format!("{header}func m() {{ f(1, 2, 3, \"x\"); }}")).is_ok());
        assert!(compile(&format!("{header}func m() {{ f(1, \"x\"); }}")).is_ok());
        assert!(compile(&format!("{header}func m() {{ f(1, 2); }}")).is_ok());
        assert_eq!(
            compile_err(&format!("{header}func m() {{ f(1); }}")),
            "Function parameter #2 expected 'num' but got no argument"
        );
        assert_eq!(
            compile_err(&format!("{header}func m() {{ f(\"x\"); }}")),
            "Function parameter #1 expected 'num' but got 'str'"
        );
    }

    #[test]
    fn skipped_parameter_gets_one_retry() {
        let header = "func f(a: num, b: num..., c: str?);\n";
        // `b` rejects the styled text and is skipped once; `c` rejects it too.
        assert_eq!(
            compile_err(&format!("{header}func m() {{ f(1, 2, `t`); }}")),
            "Function parameter #3 expected 'str' but got 'txt'"
        );
        // After `a`, the cursor moves to `b` before `c` is ever tried.
        assert_eq!(
            compile_err(&format!("{header}func m() {{ f(1, `t`); }}")),
            "Function parameter #2 expected 'str' but got 'txt'"
        );
    }

    #[test]
    fn native_plural_parameter_absorbs_arguments() {
        let program = compile_ok(
            r#"func m() { var total: num = 0; codeblock "+" <"SET VARIABLE">(total, 1, 2, 3); }"#,
        );
        let add = &program.lines[0].blocks[2];
        assert_eq!(add.action.as_deref(), Some("+"));
        assert_eq!(add.args.len(), 4);
        assert_eq!(var(&add.args[0]), ("total", "line"));
        assert_eq!(add.args[3], Item::new(ItemKind::Number(3.0)).at(3));

        assert_eq!(
            compile_err(r#"func m() { var total: num = 0; codeblock "+" <"SET VARIABLE">(total, 1, "s"); }"#),
            "Codeblock parameter #3 expected 'num' but got 'str'"
        );
    }

    #[test]
    fn call_emits_call_func_block() {
        let program = compile_ok(
            r#"func greet(who: str, times: num?);
               func main() { greet("bob"); }"#,
        );
        let call = &program.lines[0].blocks[1];
        assert_eq!(call.kind, "call_func");
        assert_eq!(call.data.as_deref(), Some("greet"));
        assert_eq!(call.action, None);
        assert_eq!(call.args, vec![Item::new(ItemKind::String("bob".into()))]);
    }

    #[test]
    fn undefined_function_reported_at_call() {
        let src = "func main() {\n    foo();\n}";
        let defs = parse(lex(src).unwrap()).unwrap();
        let err = generate(&defs, &fixture()).unwrap_err();
        assert_eq!(err.message, "Undefined function 'foo'");
        let located = err.locate("test.dfc", src);
        assert_eq!((located.line, located.col), (2, 5));
    }

    #[test]
    fn recursion_resolves() {
        assert!(compile("func loop_forever() { loop_forever(); }").is_ok());
    }

    #[test]
    fn zero_parameter_functions_take_no_arguments() {
        assert_eq!(
            compile_err("func f() {}\nfunc m() { f(1); }"),
            "Function 'f' takes no arguments"
        );
        assert_eq!(
            compile_err(r#"func m() { codeblock "ClearInv" <"PLAYER ACTION">(1); }"#),
            "Action 'ClearInv' takes no arguments"
        );
    }

    #[test]
    fn function_parameters_become_parameter_items() {
        let program = compile_ok(
            r#"func f(who: str, out result: num, rest: par... "particles", flag: txt?) {
                   result = 1;
               }"#,
        );
        let func = &program.lines[0].blocks[0];
        let kinds: Vec<&ItemKind> = func.args.iter().map(|i| &i.kind).collect();
        assert_eq!(
            kinds[0],
            &ItemKind::Parameter {
                name: "who".into(),
                ty: "txt".into(),
                optional: false,
                plural: false,
                description: "Argument #1".into(),
            }
        );
        assert!(matches!(kinds[1], ItemKind::Parameter { ty, .. } if ty == "var"));
        assert!(matches!(
            kinds[2],
            ItemKind::Parameter { ty, plural: true, description, .. } if ty == "part" && description == "particles"
        ));
        assert!(matches!(kinds[3], ItemKind::Parameter { ty, optional: true, .. } if ty == "comp"));

        // `result = 1` copies the literal into the line-scoped parameter.
        let assign = &program.lines[0].blocks[1];
        assert_eq!(assign.action.as_deref(), Some("="));
        assert_eq!(var(&assign.args[0]), ("result", "line"));
    }

    #[test]
    fn plural_parameter_is_a_list_in_body() {
        assert!(compile("func f(xs: num...) { var first: num = xs[0]; }").is_ok());
        assert_eq!(
            compile_err("func f(xs: num...) { var n: num = xs; }"),
            "Assigning a value of type 'list<num>' to variable defined as 'num'"
        );
    }

    #[test]
    fn gval_parameter_rejected() {
        assert_eq!(
            compile_err("func f(g: gval) {}"),
            "Parameter 'g' of function 'f' cannot have type 'gval'"
        );
    }

    #[test]
    fn globals_keep_their_scope() {
        let program = compile_ok("game score: num;\nsave best: num;\nfunc m() { score = score + 1; best = score; }");
        let blocks = &program.lines[0].blocks;
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[1].action.as_deref(), Some("+"));
        assert_eq!(var(&blocks[1].args[0]), ("score", "unsaved"));
        assert_eq!(blocks[2].action.as_deref(), Some("="));
        assert_eq!(var(&blocks[2].args[0]), ("best", "saved"));
        assert_eq!(var(&blocks[2].args[1]), ("score", "unsaved"));
    }

    #[test]
    fn literal_assignment_copies_once() {
        let program = compile_ok("func m() { local n: num = 5; var s: str = \"hi\"; }");
        let blocks = &program.lines[0].blocks;
        assert_eq!(blocks.len(), 3);
        assert_eq!(var(&blocks[1].args[0]), ("n", "local"));
        assert_eq!(blocks[1].args[1], Item::new(ItemKind::Number(5.0)).at(1));
    }

    #[test]
    fn temporaries_are_numbered_per_line() {
        let program = compile_ok(
            "func a() { var x: num = (1 + 2) * (3 + 4); }\nfunc b() { var y: num = (1 + 2) * 3; }",
        );
        let a = &program.lines[0].blocks;
        assert_eq!(var(&a[1].args[0]), ("__bin_l0", "line"));
        assert_eq!(var(&a[2].args[0]), ("__bin_r1", "line"));
        assert_eq!(var(&a[3].args[0]), ("x", "line"));
        let b = &program.lines[1].blocks;
        assert_eq!(var(&b[1].args[0]), ("__bin_l0", "line"));
    }

    #[test]
    fn binary_operands_must_be_numbers() {
        let src = "func m() { var x: num = 1 + \"a\"; }";
        let err = compile(src).unwrap_err();
        assert_eq!(err.message, "Currently only numbers are supported for binary operations");
        assert_eq!(err.span.start, src.find('+').unwrap());
    }

    #[test]
    fn dict_literal_values_then_create_then_set() {
        let program = compile_ok("func m() { var d: dict<num> = {\"a\": 1, \"b\": 2 * 3}; }");
        let actions: Vec<&str> = program.lines[0].blocks[1..]
            .iter()
            .map(|b| b.action.as_deref().unwrap())
            .collect();
        assert_eq!(actions, vec!["x", "CreateDict", "SetDictValue", "SetDictValue"]);
        let set_b = &program.lines[0].blocks[4];
        assert_eq!(var(&set_b.args[0]), ("d", "line"));
        assert_eq!(set_b.args[1].kind, ItemKind::String("b".into()));
        assert_eq!(var(&set_b.args[2]), ("__dict0", "line"));
    }

    #[test]
    fn dict_literal_entry_mismatch_cites_entry() {
        assert_eq!(
            compile_err("func m() { var d: dict<num> = {\"a\": 1, \"b\": \"x\"}; }"),
            "Assigning a value of type 'dict<any>' to variable defined as 'dict<num>' (entry \"b\" has type 'str')"
        );
    }

    #[test]
    fn list_literal_is_one_block() {
        let program = compile_ok("func m() { var l: list<num> = [1, 2, 3]; }");
        let create = &program.lines[0].blocks[1];
        assert_eq!(create.action.as_deref(), Some("CreateList"));
        assert_eq!(create.args.len(), 4);
        assert_eq!(create.args[3], Item::new(ItemKind::Number(3.0)).at(3));
    }

    #[test]
    fn index_reads() {
        let program = compile_ok(
            "func m() { var d: dict<str> = {}; var s: str = d.name; var l: list<num> = []; var n: num = l[0]; }",
        );
        let actions: Vec<&str> = program.lines[0].blocks[1..]
            .iter()
            .map(|b| b.action.as_deref().unwrap())
            .collect();
        assert_eq!(actions, vec!["CreateDict", "GetDictValue", "CreateList", "GetListValue"]);

        assert_eq!(
            compile_err("func m() { var d: dict<any> = {}; var x: any = d[1]; }"),
            "Cannot index into dictionary with key of type 'num' (must be a str)"
        );
        assert_eq!(
            compile_err("func m() { var l: list<any> = []; var x: any = l[\"a\"]; }"),
            "Cannot index into list with key of type 'str' (must be a num)"
        );
        assert_eq!(
            compile_err("func m() { var n: num = 1; var x: any = n[0]; }"),
            "Cannot index into object of type 'num'"
        );
        assert_eq!(
            compile_err("func m() { var s: str = \"abc\"; var x: any = s[0]; }"),
            "Indexing into a 'str' is not implemented"
        );
    }

    #[test]
    fn index_writes() {
        let program = compile_ok("func m() { var l: list<num> = []; l[0] = 5; }");
        let set = &program.lines[0].blocks[2];
        assert_eq!(set.action.as_deref(), Some("SetListValue"));
        assert_eq!(var(&set.args[0]), ("l", "line"));
        assert_eq!(set.args[2], Item::new(ItemKind::Number(5.0)).at(2));

        assert_eq!(
            compile_err("func m() { var l: list<num> = []; l[0] = \"x\"; }"),
            "List expected value of type 'num' but instead got 'str'"
        );
        assert_eq!(
            compile_err("func m() { var d: dict<num> = {}; d.a = `x`; }"),
            "Dictionary expected value of type 'num' but instead got 'txt'"
        );
    }

    #[test]
    fn cast_relabels_without_code() {
        let program = compile_ok("func m() { var d: dict<num> = (dict<num>) {\"a\": 1}; }");
        assert_eq!(program.lines[0].blocks.len(), 3);
        assert_eq!(
            compile_err("func m() { var d: dict<num> = (dict<num>) {\"a\": \"x\"}; }"),
            "Assigning a value of type 'dict<num>' to variable defined as 'dict<num>' (entry \"a\" has type 'str')"
        );
    }

    #[test]
    fn undefined_variables() {
        assert_eq!(compile_err("func m() { var x: num = y; }"), "Undefined variable 'y'");
        assert_eq!(compile_err("func m() { y = 1; }"), "Assigning an undefined variable 'y'");
    }

    #[test]
    fn native_actions() {
        let program = compile_ok(
            r#"func m() {
                   @all codeblock "SendMessage" <"PLAYER ACTION">(`hello`, `world`);
                   codeblock "Heal" <"PLAYER ACTION">;
               }"#,
        );
        let send = &program.lines[0].blocks[1];
        assert_eq!(send.kind, "player_action");
        assert_eq!(send.target.as_deref(), Some("AllPlayers"));
        assert_eq!(send.args.len(), 2);
        assert_eq!(send.tags["Alignment Mode"], "Regular");
        assert!(program.lines[0].blocks[2].args.is_empty());

        assert_eq!(
            compile_err(r#"func m() { codeblock "SendMessage" <"PLAYER ACTION">(1); }"#),
            "Codeblock parameter #1 expected 'txt' but got 'num'"
        );
        assert_eq!(
            compile_err(r#"func m() { codeblock "Heal" <"PLAYER ACTION">("x"); }"#),
            "Codeblock parameter #1 expected 'num' but got 'str'"
        );
    }

    #[test]
    fn variable_descriptor_needs_bare_variable() {
        assert!(compile(r#"func m() { var x: num = 0; codeblock "=" <"SET VARIABLE">(x, 5); }"#).is_ok());
        assert_eq!(
            compile_err(r#"func m() { codeblock "=" <"SET VARIABLE">(5, 5); }"#),
            "Codeblock parameter #1 expected 'VARIABLE' but got 'num'"
        );
    }

    #[test]
    fn unknown_schema_entries() {
        assert_eq!(
            compile_err(r#"func m() { codeblock "Fly" <"PLAYER ACTION">(); }"#),
            "Unknown action 'Fly' in codeblock category 'PLAYER ACTION'"
        );
        assert_eq!(
            compile_err(r#"func m() { codeblock "Fly" <"NOWHERE">(); }"#),
            "Unknown codeblock category 'NOWHERE'"
        );
    }

    #[test]
    fn external_functions_emit_nothing() {
        let program = compile_ok("game g: num;\nfunc ext(a: num);");
        assert!(program.lines.is_empty());
    }
}
