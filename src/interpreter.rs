pub mod environment;
pub mod module_resolver;
pub mod native_function;
pub mod value;

use crate::config::RuntimeConfig;
use crate::interpreter::environment::Environment;
use crate::interpreter::value::{Function, InstanceData, ModelClass, Value};
use crate::parser::ast::{Expr, ExprKind, MemberKind, Stmt, StmtKind, Visibility};
use crate::parser::Parser;
use crate::scanner::token::TokenType;
use crate::scanner::Scanner;
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub line: usize,
    pub message: String,
}

impl RuntimeError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Outcome of a statement: normal completion or an unwinding signal.
/// `give`, `escape`, and `skip` bubble up here instead of through errors,
/// so `try` can stay transparent to them.
pub enum Exec {
    Normal,
    Return(Value),
    Break,
    Continue,
}

type ArgVec = SmallVec<[Value; 4]>;

pub struct Interpreter {
    globals: Rc<Environment>,
    env: Rc<Environment>,
    config: RuntimeConfig,
    depth: usize,
    loading: HashSet<PathBuf>,
    /// Everything `out` printed, one entry per statement.
    pub output: Vec<String>,
}

impl Interpreter {
    pub fn new(config: RuntimeConfig) -> Self {
        let globals = Rc::new(Environment::new());
        let mut interpreter = Interpreter {
            env: Rc::clone(&globals),
            globals,
            config,
            depth: 0,
            loading: HashSet::new(),
            output: Vec::new(),
        };
        for (name, value) in native_function::all_native_functions() {
            interpreter.define_global(name, value);
        }
        interpreter
    }

    pub fn define_global(&mut self, name: &str, value: Value) {
        self.globals.define(name, value);
    }

    pub fn globals(&self) -> Rc<Environment> {
        Rc::clone(&self.globals)
    }

    pub fn env(&self) -> Rc<Environment> {
        Rc::clone(&self.env)
    }

    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<(), RuntimeError> {
        for stmt in statements {
            match self.execute(stmt)? {
                Exec::Normal => {}
                // A top-level `give` stops the script
                Exec::Return(_) => break,
                Exec::Break => {
                    return Err(RuntimeError::new(
                        stmt.line,
                        "Cannot use 'escape' outside of a loop",
                    ))
                }
                Exec::Continue => {
                    return Err(RuntimeError::new(
                        stmt.line,
                        "Cannot use 'skip' outside of a loop",
                    ))
                }
            }
        }
        Ok(())
    }

    // ============ statements ============

    fn execute(&mut self, stmt: &Stmt) -> Result<Exec, RuntimeError> {
        let line = stmt.line;
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.evaluate(expr)?;
                Ok(Exec::Normal)
            }

            StmtKind::Out(expr) => {
                let value = self.evaluate(expr)?;
                let text = value.to_string();
                println!("{}", text);
                self.output.push(text);
                Ok(Exec::Normal)
            }

            StmtKind::VarDecl { name, initializer } => {
                let value = self.evaluate(initializer)?;
                // First assignment declares; later ones update wherever
                // the name already lives
                if self.env.contains(name) {
                    self.env.assign(name, value);
                } else {
                    self.env.define(name.clone(), value);
                }
                Ok(Exec::Normal)
            }

            StmtKind::Block(statements) => {
                let child = Rc::new(Environment::with_enclosing(Rc::clone(&self.env)));
                self.execute_block(statements, child)
            }

            StmtKind::When {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Exec::Normal)
                }
            }

            StmtKind::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body)? {
                        Exec::Normal | Exec::Continue => {}
                        Exec::Break => break,
                        ret @ Exec::Return(_) => return Ok(ret),
                    }
                }
                Ok(Exec::Normal)
            }

            StmtKind::Repeat {
                variable,
                start,
                end,
                body,
            } => {
                let start_val = self.evaluate(start)?;
                let end_val = self.evaluate(end)?;
                let (Value::Num(start), Value::Num(end)) = (start_val, end_val) else {
                    return Err(RuntimeError::new(line, "Repeat bounds must be numbers"));
                };
                let (start, end) = (start as i64, end as i64);

                let loop_env = Rc::new(Environment::with_enclosing(Rc::clone(&self.env)));
                let prev = std::mem::replace(&mut self.env, Rc::clone(&loop_env));

                let result = (|| {
                    // Ascending when start <= end, descending otherwise;
                    // both ends inclusive
                    let mut i = start;
                    let step = if start <= end { 1 } else { -1 };
                    loop {
                        loop_env.define(variable.clone(), Value::Num(i as f64));
                        match self.execute(body)? {
                            Exec::Normal | Exec::Continue => {}
                            Exec::Break => break,
                            ret @ Exec::Return(_) => return Ok(ret),
                        }
                        if i == end {
                            break;
                        }
                        i += step;
                    }
                    Ok(Exec::Normal)
                })();

                self.env = prev;
                result
            }

            StmtKind::Get {
                variable,
                iterable,
                body,
            } => {
                let iterable = self.evaluate(iterable)?;

                let loop_env = Rc::new(Environment::with_enclosing(Rc::clone(&self.env)));
                let prev = std::mem::replace(&mut self.env, Rc::clone(&loop_env));

                let result = (|| {
                    match iterable {
                        // No snapshot here: mutation during iteration is
                        // observable, matching assignment through aliases
                        Value::Array(array) => {
                            let mut i = 0;
                            loop {
                                let element = match array.borrow().get(i) {
                                    Some(v) => v.clone(),
                                    None => break,
                                };
                                loop_env.define(variable.clone(), element);
                                match self.execute(body)? {
                                    Exec::Normal | Exec::Continue => {}
                                    Exec::Break => break,
                                    ret @ Exec::Return(_) => return Ok(ret),
                                }
                                i += 1;
                            }
                        }
                        Value::Str(s) => {
                            for c in s.chars() {
                                loop_env.define(variable.clone(), Value::str(c.to_string()));
                                match self.execute(body)? {
                                    Exec::Normal | Exec::Continue => {}
                                    Exec::Break => break,
                                    ret @ Exec::Return(_) => return Ok(ret),
                                }
                            }
                        }
                        Value::Dict(dict) => {
                            let keys: Vec<String> = dict.borrow().keys().cloned().collect();
                            for key in keys {
                                loop_env.define(variable.clone(), Value::str(key));
                                match self.execute(body)? {
                                    Exec::Normal | Exec::Continue => {}
                                    Exec::Break => break,
                                    ret @ Exec::Return(_) => return Ok(ret),
                                }
                            }
                        }
                        other => {
                            return Err(RuntimeError::new(
                                line,
                                format!(
                                    "Can only iterate over arrays, strings, and dictionaries, not {}",
                                    other.type_name()
                                ),
                            ))
                        }
                    }
                    Ok(Exec::Normal)
                })();

                self.env = prev;
                result
            }

            StmtKind::Task { name, params, body } => {
                let function = Value::Function(Rc::new(Function {
                    name: Rc::from(name.as_str()),
                    params: params.clone(),
                    body: Rc::clone(body),
                    closure: Rc::clone(&self.env),
                }));
                self.env.define(name.clone(), function);
                Ok(Exec::Normal)
            }

            StmtKind::Give(value) => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                Ok(Exec::Return(value))
            }

            StmtKind::Escape => Ok(Exec::Break),
            StmtKind::Skip => Ok(Exec::Continue),

            StmtKind::Model {
                name,
                parent,
                init_params,
                init_body,
                members,
            } => {
                let parent = match parent {
                    Some(parent_name) => match self.globals.get(parent_name) {
                        Some(Value::Model(class)) => Some(class),
                        Some(_) => {
                            return Err(RuntimeError::new(
                                line,
                                format!("Parent '{}' must be a model", parent_name),
                            ))
                        }
                        None => {
                            return Err(RuntimeError::new(
                                line,
                                format!("Undefined variable '{}'", parent_name),
                            ))
                        }
                    },
                    None => None,
                };

                let mut methods = HashMap::new();
                let mut visibility = HashMap::new();
                for member in members {
                    match &member.kind {
                        MemberKind::Method {
                            name: method_name,
                            params,
                            body,
                        } => {
                            visibility.insert(method_name.clone(), member.visibility);
                            // Methods close over the globals; `self` is bound
                            // at access time
                            methods.insert(
                                method_name.clone(),
                                Value::Function(Rc::new(Function {
                                    name: Rc::from(method_name.as_str()),
                                    params: params.clone(),
                                    body: Rc::clone(body),
                                    closure: Rc::clone(&self.globals),
                                })),
                            );
                        }
                        // Property initializers are declaration metadata;
                        // values come from init
                        MemberKind::Property {
                            name: prop_name, ..
                        } => {
                            visibility.insert(prop_name.clone(), member.visibility);
                        }
                    }
                }

                let class = Rc::new(ModelClass {
                    name: name.clone(),
                    parent,
                    init_params: init_params.clone(),
                    init_body: Rc::clone(init_body),
                    methods,
                    visibility,
                });
                self.globals.define(name.clone(), Value::Model(class));
                Ok(Exec::Normal)
            }

            StmtKind::Struct { name, fields } => {
                // A struct is a model whose init assigns every field from
                // the same-named parameter
                let init_body: Vec<Stmt> = fields
                    .iter()
                    .map(|field| Stmt {
                        kind: StmtKind::Expr(Expr {
                            kind: ExprKind::Set {
                                object: Box::new(Expr {
                                    kind: ExprKind::SelfExpr,
                                    line,
                                }),
                                name: field.clone(),
                                value: Box::new(Expr {
                                    kind: ExprKind::Identifier(field.clone()),
                                    line,
                                }),
                            },
                            line,
                        }),
                        line,
                    })
                    .collect();

                let visibility = fields
                    .iter()
                    .map(|f| (f.clone(), Visibility::Shown))
                    .collect();

                let class = Rc::new(ModelClass {
                    name: name.clone(),
                    parent: None,
                    init_params: fields.clone(),
                    init_body: Rc::new(init_body),
                    methods: HashMap::new(),
                    visibility,
                });
                self.globals.define(name.clone(), Value::Model(class));
                Ok(Exec::Normal)
            }

            StmtKind::Use(path) => {
                self.import_module(path, line)?;
                Ok(Exec::Normal)
            }

            StmtKind::Try {
                body,
                catch_var,
                catch_body,
            } => {
                match self.execute(body) {
                    // Unwinding signals pass through untouched
                    Ok(signal) => Ok(signal),
                    Err(error) => {
                        let catch_env =
                            Rc::new(Environment::with_enclosing(Rc::clone(&self.env)));
                        catch_env.define(catch_var.clone(), Value::str(error.message));

                        let prev = std::mem::replace(&mut self.env, catch_env);
                        let result = self.execute(catch_body);
                        self.env = prev;
                        result
                    }
                }
            }

            StmtKind::Throw(expr) => {
                let value = self.evaluate(expr)?;
                Err(RuntimeError::new(line, value.to_string()))
            }
        }
    }

    fn execute_block(&mut self, statements: &[Stmt], env: Rc<Environment>) -> Result<Exec, RuntimeError> {
        let prev = std::mem::replace(&mut self.env, env);

        let mut result = Ok(Exec::Normal);
        for stmt in statements {
            match self.execute(stmt) {
                Ok(Exec::Normal) => {}
                other => {
                    result = other;
                    break;
                }
            }
        }

        self.env = prev;
        result
    }

    // ============ expressions ============

    fn evaluate(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        let line = expr.line;
        match &expr.kind {
            ExprKind::Num(n) => Ok(Value::Num(*n)),
            ExprKind::Str(s) => Ok(Value::str(s.clone())),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Nil => Ok(Value::Nil),

            ExprKind::Identifier(name) => self.env.get(name).ok_or_else(|| {
                RuntimeError::new(line, format!("Undefined variable '{}'", name))
            }),

            ExprKind::SelfExpr => self.env.get("self").ok_or_else(|| {
                RuntimeError::new(line, "Cannot use 'self' outside of a model")
            }),

            ExprKind::Binary { left, op, right } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                self.binary_op(op, left, right, line)
            }

            ExprKind::Logical { left, op, right } => {
                let left = self.evaluate(left)?;
                // The deciding operand is returned as-is, not coerced
                match op {
                    TokenType::Or if left.is_truthy() => Ok(left),
                    TokenType::And if !left.is_truthy() => Ok(left),
                    _ => self.evaluate(right),
                }
            }

            ExprKind::Unary { op, operand } => {
                let operand = self.evaluate(operand)?;
                match op {
                    TokenType::Minus => match operand {
                        Value::Num(n) => Ok(Value::Num(-n)),
                        other => Err(RuntimeError::new(
                            line,
                            format!("Operand must be a number, not {}", other.type_name()),
                        )),
                    },
                    _ => Ok(Value::Bool(!operand.is_truthy())),
                }
            }

            ExprKind::Call { callee, arguments } => {
                let callee = self.evaluate(callee)?;
                let mut args = ArgVec::new();
                for argument in arguments {
                    args.push(self.evaluate(argument)?);
                }
                self.call_function(&callee, &args, line)
            }

            ExprKind::Index { object, index } => {
                let object = self.evaluate(object)?;
                let index = self.evaluate(index)?;
                self.index_value(&object, &index, line)
            }

            ExprKind::PropertyAccess { object, property } => {
                let object = self.evaluate(object)?;
                self.access_property(&object, property, line)
            }

            ExprKind::New {
                class_name,
                arguments,
            } => {
                let class = match self.globals.get(class_name) {
                    Some(Value::Model(class)) => class,
                    Some(_) => {
                        return Err(RuntimeError::new(
                            line,
                            format!("'{}' is not a model", class_name),
                        ))
                    }
                    None => {
                        return Err(RuntimeError::new(
                            line,
                            format!("Undefined variable '{}'", class_name),
                        ))
                    }
                };
                let mut args = ArgVec::new();
                for argument in arguments {
                    args.push(self.evaluate(argument)?);
                }
                self.instantiate(&class, &args, line)
            }

            ExprKind::Set {
                object,
                name,
                value,
            } => {
                let object = self.evaluate(object)?;
                let value = self.evaluate(value)?;
                match &object {
                    Value::Dict(dict) => {
                        dict.borrow_mut().insert(name.clone(), value.clone());
                        Ok(value)
                    }
                    Value::Instance(instance) => {
                        self.check_member_access(instance, name, "modify", line)?;
                        instance
                            .properties
                            .borrow_mut()
                            .insert(name.clone(), value.clone());
                        Ok(value)
                    }
                    other => Err(RuntimeError::new(
                        line,
                        format!(
                            "Only instances or dictionaries have fields, not {}",
                            other.type_name()
                        ),
                    )),
                }
            }

            ExprKind::Assign {
                name,
                value,
                index,
                object,
            } => {
                let value = self.evaluate(value)?;

                if let (Some(index), Some(object)) = (index, object) {
                    let object = self.evaluate(object)?;
                    let index = self.evaluate(index)?;
                    self.index_assign(&object, &index, value.clone(), line)?;
                    return Ok(value);
                }

                // Mutate the nearest binding; a brand-new name lands in the
                // current scope
                if !self.env.assign(name, value.clone()) {
                    self.env.define(name.clone(), value.clone());
                }
                Ok(value)
            }

            ExprKind::Array(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.evaluate(element)?);
                }
                Ok(Value::array(values))
            }

            ExprKind::Dictionary(pairs) => {
                let mut map = HashMap::new();
                for (key, value) in pairs {
                    let key = self.evaluate(key)?;
                    let value = self.evaluate(value)?;
                    map.insert(key.to_string(), value);
                }
                Ok(Value::dict(map))
            }

            ExprKind::Lambda { params, body } => Ok(Value::Function(Rc::new(Function {
                name: Rc::from("<lambda>"),
                params: params.clone(),
                body: Rc::clone(body),
                closure: Rc::clone(&self.env),
            }))),
        }
    }

    fn binary_op(
        &mut self,
        op: &TokenType,
        left: Value,
        right: Value,
        line: usize,
    ) -> Result<Value, RuntimeError> {
        match op {
            TokenType::Plus => match (&left, &right) {
                (Value::Num(a), Value::Num(b)) => Ok(Value::Num(a + b)),
                (Value::Str(_), _) | (_, Value::Str(_)) => {
                    Ok(Value::str(format!("{}{}", left, right)))
                }
                (Value::Array(a), Value::Array(b)) => {
                    let mut elements = a.borrow().clone();
                    elements.extend(b.borrow().iter().cloned());
                    Ok(Value::array(elements))
                }
                _ => Err(RuntimeError::new(
                    line,
                    "Operands must be numbers, strings, or arrays for '+'",
                )),
            },

            TokenType::Minus => {
                let (a, b) = self.number_operands(&left, &right, line)?;
                Ok(Value::Num(a - b))
            }

            TokenType::Star => match (&left, &right) {
                (Value::Num(a), Value::Num(b)) => Ok(Value::Num(a * b)),
                (Value::Str(s), Value::Num(n)) => {
                    let times = if *n > 0.0 { *n as usize } else { 0 };
                    Ok(Value::str(s.repeat(times)))
                }
                _ => Err(RuntimeError::new(line, "Operands must be numbers for '*'")),
            },

            TokenType::Slash => {
                let (a, b) = self.number_operands(&left, &right, line)?;
                if b == 0.0 {
                    return Err(RuntimeError::new(line, "Division by zero"));
                }
                Ok(Value::Num(a / b))
            }

            TokenType::Percent => {
                let (a, b) = self.number_operands(&left, &right, line)?;
                if b == 0.0 {
                    return Err(RuntimeError::new(line, "Division by zero"));
                }
                Ok(Value::Num(a % b))
            }

            TokenType::Equal => Ok(Value::Bool(left == right)),
            TokenType::NotEqual => Ok(Value::Bool(left != right)),

            TokenType::Less => {
                let (a, b) = self.number_operands(&left, &right, line)?;
                Ok(Value::Bool(a < b))
            }
            TokenType::LessEqual => {
                let (a, b) = self.number_operands(&left, &right, line)?;
                Ok(Value::Bool(a <= b))
            }
            TokenType::Greater => {
                let (a, b) = self.number_operands(&left, &right, line)?;
                Ok(Value::Bool(a > b))
            }
            TokenType::GreaterEqual => {
                let (a, b) = self.number_operands(&left, &right, line)?;
                Ok(Value::Bool(a >= b))
            }

            TokenType::In => match &right {
                Value::Dict(dict) => {
                    Ok(Value::Bool(dict.borrow().contains_key(&left.to_string())))
                }
                Value::Array(array) => {
                    Ok(Value::Bool(array.borrow().iter().any(|e| *e == left)))
                }
                Value::Str(s) => Ok(Value::Bool(s.contains(&left.to_string()))),
                _ => Err(RuntimeError::new(
                    line,
                    "'in' operator expects dictionary, array, or string on right side",
                )),
            },

            other => Err(RuntimeError::new(
                line,
                format!("Unknown binary operator {:?}", other),
            )),
        }
    }

    fn number_operands(
        &self,
        left: &Value,
        right: &Value,
        line: usize,
    ) -> Result<(f64, f64), RuntimeError> {
        match (left, right) {
            (Value::Num(a), Value::Num(b)) => Ok((*a, *b)),
            _ => Err(RuntimeError::new(line, "Operands must be numbers")),
        }
    }

    fn index_value(
        &self,
        object: &Value,
        index: &Value,
        line: usize,
    ) -> Result<Value, RuntimeError> {
        match object {
            Value::Array(array) => {
                let idx = self.array_index(index, array.borrow().len(), line)?;
                Ok(array.borrow()[idx].clone())
            }
            Value::Str(s) => {
                let Value::Num(n) = index else {
                    return Err(RuntimeError::new(line, "String index must be a number"));
                };
                let idx = *n as i64;
                match s.chars().nth(idx.max(0) as usize) {
                    Some(c) if idx >= 0 => Ok(Value::str(c.to_string())),
                    _ => Err(RuntimeError::new(
                        line,
                        format!("String index out of bounds: {}", idx),
                    )),
                }
            }
            // Missing dictionary keys read as nil
            Value::Dict(dict) => Ok(dict
                .borrow()
                .get(&index.to_string())
                .cloned()
                .unwrap_or(Value::Nil)),
            other => Err(RuntimeError::new(
                line,
                format!(
                    "Can only index arrays, strings, or dictionaries, not {}",
                    other.type_name()
                ),
            )),
        }
    }

    fn array_index(&self, index: &Value, len: usize, line: usize) -> Result<usize, RuntimeError> {
        let Value::Num(n) = index else {
            return Err(RuntimeError::new(line, "Array index must be a number"));
        };
        let idx = *n as i64;
        if idx < 0 || idx as usize >= len {
            return Err(RuntimeError::new(
                line,
                format!("Array index out of bounds: {}", idx),
            ));
        }
        Ok(idx as usize)
    }

    fn index_assign(
        &self,
        object: &Value,
        index: &Value,
        value: Value,
        line: usize,
    ) -> Result<(), RuntimeError> {
        match object {
            Value::Array(array) => {
                let idx = self.array_index(index, array.borrow().len(), line)?;
                array.borrow_mut()[idx] = value;
                Ok(())
            }
            Value::Dict(dict) => {
                dict.borrow_mut().insert(index.to_string(), value);
                Ok(())
            }
            other => Err(RuntimeError::new(
                line,
                format!(
                    "Target of indexed assignment must be an array or dictionary, not {}",
                    other.type_name()
                ),
            )),
        }
    }

    fn access_property(
        &self,
        object: &Value,
        property: &str,
        line: usize,
    ) -> Result<Value, RuntimeError> {
        match object {
            Value::Instance(instance) => {
                self.check_member_access(instance, property, "access", line)?;

                // Properties on the instance win over methods
                if let Some(value) = instance.properties.borrow().get(property) {
                    return Ok(value.clone());
                }

                if let Some(method) = instance.class.find_method(property) {
                    if let Value::Function(func) = method {
                        // Bind the receiver: a fresh scope between the
                        // method's closure and its body carries `self`
                        let bound = Environment::with_enclosing(Rc::clone(&func.closure));
                        bound.define("self", object.clone());
                        return Ok(Value::Function(Rc::new(Function {
                            name: Rc::clone(&func.name),
                            params: func.params.clone(),
                            body: Rc::clone(&func.body),
                            closure: Rc::new(bound),
                        })));
                    }
                    return Ok(method.clone());
                }

                Err(RuntimeError::new(
                    line,
                    format!("Undefined property '{}'", property),
                ))
            }
            Value::Array(array) if property == "len" => {
                Ok(Value::Num(array.borrow().len() as f64))
            }
            Value::Str(s) if property == "len" => Ok(Value::Num(s.chars().count() as f64)),
            Value::Dict(dict) => Ok(dict
                .borrow()
                .get(property)
                .cloned()
                .unwrap_or(Value::Nil)),
            other => Err(RuntimeError::new(
                line,
                format!("Only objects have properties, not {}", other.type_name()),
            )),
        }
    }

    /// A hidden member is reachable only while `self` is the same instance.
    fn check_member_access(
        &self,
        instance: &Rc<InstanceData>,
        name: &str,
        action: &str,
        line: usize,
    ) -> Result<(), RuntimeError> {
        if instance.class.find_visibility(name) == Some(Visibility::Hidden) {
            let allowed = matches!(
                self.env.get("self"),
                Some(Value::Instance(me)) if Rc::ptr_eq(&me, instance)
            );
            if !allowed {
                return Err(RuntimeError::new(
                    line,
                    format!("Cannot {} hidden member '{}'", action, name),
                ));
            }
        }
        Ok(())
    }

    // ============ calls ============

    pub fn call_function(
        &mut self,
        callee: &Value,
        args: &[Value],
        line: usize,
    ) -> Result<Value, RuntimeError> {
        if self.depth >= self.config.max_call_depth {
            return Err(RuntimeError::new(line, "Stack overflow"));
        }
        self.depth += 1;
        let result = self.call_function_inner(callee, args, line);
        self.depth -= 1;
        result
    }

    fn call_function_inner(
        &mut self,
        callee: &Value,
        args: &[Value],
        line: usize,
    ) -> Result<Value, RuntimeError> {
        match callee {
            Value::NativeFn(native) => {
                if let Some(arity) = native.arity {
                    if args.len() != arity {
                        return Err(RuntimeError::new(
                            line,
                            format!("Expected {} arguments but got {}", arity, args.len()),
                        ));
                    }
                }
                (native.func)(self, args).map_err(|message| RuntimeError::new(line, message))
            }

            Value::Function(func) => {
                if args.len() != func.params.len() {
                    return Err(RuntimeError::new(
                        line,
                        format!(
                            "Expected {} arguments but got {}",
                            func.params.len(),
                            args.len()
                        ),
                    ));
                }

                let func_env = Environment::with_enclosing(Rc::clone(&func.closure));
                for (param, arg) in func.params.iter().zip(args) {
                    func_env.define(param.clone(), arg.clone());
                }

                let body = Rc::clone(&func.body);
                match self.execute_block(&body, Rc::new(func_env))? {
                    Exec::Return(value) => Ok(value),
                    _ => Ok(Value::Nil),
                }
            }

            Value::Model(class) => self.instantiate(class, args, line),

            other => Err(RuntimeError::new(
                line,
                format!("Can only call functions or models, not {}", other.type_name()),
            )),
        }
    }

    fn instantiate(
        &mut self,
        class: &Rc<ModelClass>,
        args: &[Value],
        line: usize,
    ) -> Result<Value, RuntimeError> {
        if args.len() != class.init_params.len() {
            return Err(RuntimeError::new(
                line,
                format!(
                    "Expected {} arguments for init but got {}",
                    class.init_params.len(),
                    args.len()
                ),
            ));
        }

        let instance = Value::Instance(Rc::new(InstanceData {
            class: Rc::clone(class),
            properties: std::cell::RefCell::new(HashMap::new()),
        }));

        if !class.init_body.is_empty() {
            // init runs in a fresh scope under the globals with `self` and
            // the parameters bound
            let init_env = Environment::with_enclosing(Rc::clone(&self.globals));
            init_env.define("self", instance.clone());
            for (param, arg) in class.init_params.iter().zip(args) {
                init_env.define(param.clone(), arg.clone());
            }

            let body = Rc::clone(&class.init_body);
            // A `give` inside init is ignored; the instance is the result
            self.execute_block(&body, Rc::new(init_env))?;
        }

        Ok(instance)
    }

    // ============ modules ============

    fn import_module(&mut self, path: &str, line: usize) -> Result<(), RuntimeError> {
        let resolved = module_resolver::resolve(path, &self.config.lib_root)
            .map_err(|message| RuntimeError::new(line, message))?;

        let canonical = resolved.canonicalize().unwrap_or_else(|_| resolved.clone());
        if !self.loading.insert(canonical.clone()) {
            return Err(RuntimeError::new(
                line,
                format!("Circular import of module '{}'", path),
            ));
        }

        let result = self.run_module(&resolved, path, line);
        self.loading.remove(&canonical);
        result
    }

    fn run_module(&mut self, file: &std::path::Path, path: &str, line: usize) -> Result<(), RuntimeError> {
        let source = std::fs::read_to_string(file).map_err(|e| {
            RuntimeError::new(line, format!("Could not read module '{}': {}", path, e))
        })?;

        let scanned = Scanner::new(source).scan_tokens();
        if !scanned.errors.is_empty() {
            let first = &scanned.errors[0];
            return Err(RuntimeError::new(
                line,
                format!("Lexer error in module '{}': {}", path, first.message),
            ));
        }

        let statements = Parser::new(scanned.tokens).parse().map_err(|errors| {
            RuntimeError::new(
                line,
                format!("Parser error in module '{}': {}", path, errors[0].message),
            )
        })?;

        // Module top-level runs in the importer's globals so its tasks and
        // models become visible everywhere
        let globals = Rc::clone(&self.globals);
        match self.execute_block(&statements, globals)? {
            Exec::Normal | Exec::Return(_) => Ok(()),
            _ => Err(RuntimeError::new(
                line,
                format!("Loop control outside of a loop in module '{}'", path),
            )),
        }
    }
}
