use super::value::{NativeFunction, Value};
use super::Interpreter;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

fn native(
    name: &str,
    arity: Option<usize>,
    func: fn(&mut Interpreter, &[Value]) -> Result<Value, String>,
) -> Value {
    Value::NativeFn(Rc::new(NativeFunction {
        name: Rc::from(name),
        arity,
        func,
    }))
}

pub fn all_native_functions() -> Vec<(&'static str, Value)> {
    vec![
        ("clock", native("clock", Some(0), native_clock)),
        ("__input__", native("input", Some(0), native_read_line)),
        ("input", native("input", None, native_input)),
        ("print", native("print", None, native_print)),
        ("len", native("len", Some(1), native_len)),
        ("push", native("push", Some(2), native_push)),
        ("pop", native("pop", Some(1), native_pop)),
        ("str", native("str", Some(1), native_str)),
        ("num", native("num", Some(1), native_num)),
        ("type", native("type", Some(1), native_type)),
        ("floor", native("floor", Some(1), native_floor)),
        ("abs", native("abs", Some(1), native_abs)),
        ("min", native("min", Some(2), native_min)),
        ("max", native("max", Some(2), native_max)),
        ("range", native("range", None, native_range)),
        ("keys", native("keys", Some(1), native_keys)),
        ("values", native("values", Some(1), native_values)),
        ("map", native("map", Some(2), native_map)),
        ("filter", native("filter", Some(2), native_filter)),
        ("reduce", native("reduce", Some(3), native_reduce)),
    ]
}

fn native_clock(_interp: &mut Interpreter, _args: &[Value]) -> Result<Value, String> {
    let ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| format!("clock: {}", e))?
        .as_millis();
    Ok(Value::Num(ms as f64))
}

fn read_line() -> Result<Value, String> {
    use std::io::BufRead;
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| format!("input: {}", e))?;
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    Ok(Value::str(line))
}

fn native_read_line(_interp: &mut Interpreter, _args: &[Value]) -> Result<Value, String> {
    read_line()
}

// input(prompt?) - read a line, optionally printing a prompt first
fn native_input(_interp: &mut Interpreter, args: &[Value]) -> Result<Value, String> {
    use std::io::Write;
    if let Some(prompt) = args.first() {
        print!("{}", prompt);
        let _ = std::io::stdout().flush();
    }
    read_line()
}

fn native_print(_interp: &mut Interpreter, args: &[Value]) -> Result<Value, String> {
    let joined = args
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    println!("{}", joined);
    Ok(Value::Nil)
}

fn native_len(_interp: &mut Interpreter, args: &[Value]) -> Result<Value, String> {
    match &args[0] {
        Value::Str(s) => Ok(Value::Num(s.chars().count() as f64)),
        Value::Array(a) => Ok(Value::Num(a.borrow().len() as f64)),
        Value::Dict(d) => Ok(Value::Num(d.borrow().len() as f64)),
        _ => Err("len() expects string, array, or dictionary".to_string()),
    }
}

// push(arr, val) returns the array for chaining
fn native_push(_interp: &mut Interpreter, args: &[Value]) -> Result<Value, String> {
    match &args[0] {
        Value::Array(a) => {
            a.borrow_mut().push(args[1].clone());
            Ok(args[0].clone())
        }
        _ => Err("push() expects array as first argument".to_string()),
    }
}

fn native_pop(_interp: &mut Interpreter, args: &[Value]) -> Result<Value, String> {
    match &args[0] {
        Value::Array(a) => a
            .borrow_mut()
            .pop()
            .ok_or_else(|| "pop() on empty array".to_string()),
        _ => Err("pop() expects array".to_string()),
    }
}

fn native_str(_interp: &mut Interpreter, args: &[Value]) -> Result<Value, String> {
    Ok(Value::str(args[0].to_string()))
}

fn native_num(_interp: &mut Interpreter, args: &[Value]) -> Result<Value, String> {
    match &args[0] {
        Value::Num(_) => Ok(args[0].clone()),
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Num)
            .map_err(|_| format!("Cannot convert '{}' to number", s)),
        Value::Bool(b) => Ok(Value::Num(if *b { 1.0 } else { 0.0 })),
        other => Err(format!("Cannot convert {} to number", other.type_name())),
    }
}

fn native_type(_interp: &mut Interpreter, args: &[Value]) -> Result<Value, String> {
    Ok(Value::str(args[0].type_name()))
}

fn expect_num(value: &Value, what: &str) -> Result<f64, String> {
    match value {
        Value::Num(n) => Ok(*n),
        _ => Err(format!("{} expects a number", what)),
    }
}

fn native_floor(_interp: &mut Interpreter, args: &[Value]) -> Result<Value, String> {
    Ok(Value::Num(expect_num(&args[0], "floor()")?.floor()))
}

fn native_abs(_interp: &mut Interpreter, args: &[Value]) -> Result<Value, String> {
    Ok(Value::Num(expect_num(&args[0], "abs()")?.abs()))
}

fn native_min(_interp: &mut Interpreter, args: &[Value]) -> Result<Value, String> {
    let (a, b) = (expect_num(&args[0], "min()")?, expect_num(&args[1], "min()")?);
    Ok(Value::Num(a.min(b)))
}

fn native_max(_interp: &mut Interpreter, args: &[Value]) -> Result<Value, String> {
    let (a, b) = (expect_num(&args[0], "max()")?, expect_num(&args[1], "max()")?);
    Ok(Value::Num(a.max(b)))
}

// range(end) or range(start, end), end exclusive
fn native_range(_interp: &mut Interpreter, args: &[Value]) -> Result<Value, String> {
    let (start, end) = match args {
        [end] => (0, expect_num(end, "range()")? as i64),
        [start, end] => (
            expect_num(start, "range()")? as i64,
            expect_num(end, "range()")? as i64,
        ),
        _ => return Err("range() expects 1 or 2 arguments".to_string()),
    };
    let elements = (start..end).map(|i| Value::Num(i as f64)).collect();
    Ok(Value::array(elements))
}

fn native_keys(_interp: &mut Interpreter, args: &[Value]) -> Result<Value, String> {
    match &args[0] {
        Value::Dict(d) => Ok(Value::array(
            d.borrow().keys().map(|k| Value::str(k.clone())).collect(),
        )),
        _ => Err("keys() expects dictionary".to_string()),
    }
}

fn native_values(_interp: &mut Interpreter, args: &[Value]) -> Result<Value, String> {
    match &args[0] {
        Value::Dict(d) => Ok(Value::array(d.borrow().values().cloned().collect())),
        _ => Err("values() expects dictionary".to_string()),
    }
}

fn array_arg<'a>(args: &'a [Value], what: &str) -> Result<&'a Value, String> {
    match &args[0] {
        Value::Array(_) => Ok(&args[0]),
        _ => Err(format!("{} expects array as first argument", what)),
    }
}

fn callable_arg<'a>(args: &'a [Value], what: &str) -> Result<&'a Value, String> {
    if args[1].is_callable() {
        Ok(&args[1])
    } else {
        Err(format!("{} expects function as second argument", what))
    }
}

fn native_map(interp: &mut Interpreter, args: &[Value]) -> Result<Value, String> {
    let Value::Array(array) = array_arg(args, "map()")? else {
        unreachable!()
    };
    let func = callable_arg(args, "map()")?.clone();

    let elements = array.borrow().clone();
    let mut result = Vec::with_capacity(elements.len());
    for element in elements {
        let mapped = interp
            .call_function(&func, &[element], 0)
            .map_err(|e| e.message)?;
        result.push(mapped);
    }
    Ok(Value::array(result))
}

fn native_filter(interp: &mut Interpreter, args: &[Value]) -> Result<Value, String> {
    let Value::Array(array) = array_arg(args, "filter()")? else {
        unreachable!()
    };
    let func = callable_arg(args, "filter()")?.clone();

    let elements = array.borrow().clone();
    let mut result = Vec::new();
    for element in elements {
        let keep = interp
            .call_function(&func, &[element.clone()], 0)
            .map_err(|e| e.message)?;
        if keep.is_truthy() {
            result.push(element);
        }
    }
    Ok(Value::array(result))
}

fn native_reduce(interp: &mut Interpreter, args: &[Value]) -> Result<Value, String> {
    let Value::Array(array) = array_arg(args, "reduce()")? else {
        unreachable!()
    };
    if !args[1].is_callable() {
        return Err("reduce() expects function as second argument".to_string());
    }
    let func = args[1].clone();

    let elements = array.borrow().clone();
    let mut acc = args[2].clone();
    for element in elements {
        acc = interp
            .call_function(&func, &[acc, element], 0)
            .map_err(|e| e.message)?;
    }
    Ok(acc)
}
