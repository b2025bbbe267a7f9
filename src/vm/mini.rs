//! Minimal reference VM
//!
//! Understands just enough of an expression language to drive the host end
//! to end: numbers, string literals, variables, arithmetic and comparison
//! operators, parentheses, memory indexing (`buf[i]`), assignment,
//! `;`-separated statements, `//` and `/* */` comments, and calls into host
//! functions. Anything else is a compile error.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::{
    new_var, ArgRef, CodeHandle, ScriptHost, SymbolResolver, Var, Vm, VmAccess,
    DEFAULT_MEMORY_SLOTS,
};

/// Number of user string slots (ids `0..USER_STRING_SLOTS`)
const USER_STRING_SLOTS: i64 = 1024;
/// First id handed out to string literals
const FIRST_LITERAL_ID: i64 = 10000;

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug)]
enum Expr {
    Num(f64),
    Var(Var),
    Index(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    Bin(BinOp, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
    AssignVar(Var, Box<Expr>),
    AssignMem(Box<Expr>, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(f64),
    Str(String),
    Ident(String),
    Sym(&'static str),
}

struct Token {
    tok: Tok,
    line: usize,
}

// Longer operators first so prefixes do not shadow them
const SYMBOLS: [&str; 17] = [
    "==", "!=", "<=", ">=", "+", "-", "*", "/", "=", "(", ")", "[", "]", ",", ";", "<", ">",
];

fn tokenize(source: &str) -> Result<Vec<Token>, (usize, String)> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut line = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        if c == b'\n' {
            line += 1;
            pos += 1;
        } else if c.is_ascii_whitespace() {
            pos += 1;
        } else if source[pos..].starts_with("//") {
            while pos < bytes.len() && bytes[pos] != b'\n' {
                pos += 1;
            }
        } else if source[pos..].starts_with("/*") {
            let end = source[pos + 2..]
                .find("*/")
                .ok_or((line, "unterminated comment".to_string()))?;
            line += source[pos..pos + 2 + end].matches('\n').count();
            pos += end + 4;
        } else if c.is_ascii_digit() || (c == b'.' && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit)) {
            let start = pos;
            while pos < bytes.len() && (bytes[pos].is_ascii_digit() || bytes[pos] == b'.') {
                pos += 1;
            }
            let value = source[start..pos]
                .parse::<f64>()
                .map_err(|_| (line, format!("bad number '{}'", &source[start..pos])))?;
            tokens.push(Token { tok: Tok::Num(value), line });
        } else if c.is_ascii_alphabetic() || c == b'_' {
            let start = pos;
            while pos < bytes.len()
                && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_' || bytes[pos] == b'.')
            {
                pos += 1;
            }
            tokens.push(Token { tok: Tok::Ident(source[start..pos].to_string()), line });
        } else if c == b'"' {
            let end = source[pos + 1..]
                .find('"')
                .ok_or((line, "unterminated string".to_string()))?;
            let text = &source[pos + 1..pos + 1 + end];
            tokens.push(Token { tok: Tok::Str(text.to_string()), line });
            line += text.matches('\n').count();
            pos += end + 2;
        } else if let Some(sym) = SYMBOLS.iter().find(|s| source[pos..].starts_with(**s)) {
            tokens.push(Token { tok: Tok::Sym(*sym), line });
            pos += sym.len();
        } else {
            let ch = source[pos..].chars().next().unwrap_or('?');
            return Err((line, format!("unexpected character '{}'", ch)));
        }
    }
    Ok(tokens)
}

struct Linker<'a> {
    vars: &'a mut HashMap<String, Var>,
    symbols: &'a dyn SymbolResolver,
    memory: &'a mut MiniMemory,
}

impl Linker<'_> {
    fn variable(&mut self, name: &str) -> Var {
        if let Some(var) = self.symbols.resolve(name) {
            return var;
        }
        Arc::clone(self.vars.entry(name.to_string()).or_insert_with(|| new_var(0.0)))
    }
}

struct Parser<'a, 'b> {
    tokens: &'a [Token],
    pos: usize,
    linker: Linker<'b>,
}

type ParseResult<T> = Result<T, (usize, String)>;

impl Parser<'_, '_> {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|t| &t.tok)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(0, |t| t.line)
    }

    fn eat(&mut self, sym: &str) -> bool {
        if matches!(self.peek(), Some(Tok::Sym(s)) if *s == sym) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, sym: &str) -> ParseResult<()> {
        if self.eat(sym) {
            Ok(())
        } else {
            Err((self.line(), format!("expected '{}'", sym)))
        }
    }

    fn program(&mut self) -> ParseResult<Vec<Expr>> {
        let mut statements = Vec::new();
        while self.peek().is_some() {
            if self.eat(";") {
                continue;
            }
            statements.push(self.expr()?);
            if self.peek().is_some() {
                self.expect(";")?;
            }
        }
        Ok(statements)
    }

    fn expr(&mut self) -> ParseResult<Expr> {
        let lhs = self.comparison()?;
        if !self.eat("=") {
            return Ok(lhs);
        }
        let rhs = Box::new(self.expr()?);
        match lhs {
            Expr::Var(var) => Ok(Expr::AssignVar(var, rhs)),
            Expr::Index(base, index) => Ok(Expr::AssignMem(base, index, rhs)),
            _ => Err((self.line(), "invalid assignment target".to_string())),
        }
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.additive()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Sym("==")) => BinOp::Eq,
                Some(Tok::Sym("!=")) => BinOp::Ne,
                Some(Tok::Sym("<")) => BinOp::Lt,
                Some(Tok::Sym("<=")) => BinOp::Le,
                Some(Tok::Sym(">")) => BinOp::Gt,
                Some(Tok::Sym(">=")) => BinOp::Ge,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            lhs = Expr::Bin(op, Box::new(lhs), Box::new(self.additive()?));
        }
    }

    fn additive(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Sym("+")) => BinOp::Add,
                Some(Tok::Sym("-")) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            lhs = Expr::Bin(op, Box::new(lhs), Box::new(self.term()?));
        }
    }

    fn term(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Sym("*")) => BinOp::Mul,
                Some(Tok::Sym("/")) => BinOp::Div,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            lhs = Expr::Bin(op, Box::new(lhs), Box::new(self.unary()?));
        }
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        if self.eat("-") {
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        let mut expr = self.primary()?;
        while self.eat("[") {
            let index = self.expr()?;
            self.expect("]")?;
            expr = Expr::Index(Box::new(expr), Box::new(index));
        }
        Ok(expr)
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        let line = self.line();
        let token = self
            .tokens
            .get(self.pos)
            .map(|t| t.tok.clone())
            .ok_or((line, "unexpected end of code".to_string()))?;
        self.pos += 1;

        match token {
            Tok::Num(value) => Ok(Expr::Num(value)),
            Tok::Str(text) => Ok(Expr::Num(self.linker.memory.intern(text))),
            Tok::Ident(name) => {
                if self.eat("(") {
                    let mut args = Vec::new();
                    if !self.eat(")") {
                        loop {
                            args.push(self.expr()?);
                            if self.eat(")") {
                                break;
                            }
                            self.expect(",")?;
                        }
                    }
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(Expr::Var(self.linker.variable(&name)))
                }
            }
            Tok::Sym("(") => {
                let inner = self.expr()?;
                self.expect(")")?;
                Ok(inner)
            }
            Tok::Sym(sym) => Err((line, format!("unexpected '{}'", sym))),
        }
    }
}

/// Linear memory and string table of a [`MiniVm`]
#[derive(Debug)]
pub struct MiniMemory {
    slots: Vec<f64>,
    limit: usize,
    strings: HashMap<i64, String>,
    next_literal: i64,
}

impl MiniMemory {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            limit: DEFAULT_MEMORY_SLOTS,
            strings: HashMap::new(),
            next_literal: FIRST_LITERAL_ID,
        }
    }

    fn intern(&mut self, text: String) -> f64 {
        let id = self.next_literal;
        self.next_literal += 1;
        self.strings.insert(id, text);
        id as f64
    }

    fn string_key(id: f64) -> Option<i64> {
        (id.fract() == 0.0 && id >= 0.0).then_some(id as i64)
    }

    fn read_slot(&self, addr: f64) -> f64 {
        if addr < 0.0 {
            return 0.0;
        }
        let mut out = [0.0];
        self.read_memory(addr as usize, &mut out);
        out[0]
    }

    fn write_slot(&mut self, addr: f64, value: f64) {
        if addr >= 0.0 {
            self.write_memory(addr as usize, &[value]);
        }
    }
}

impl VmAccess for MiniMemory {
    fn read_memory(&self, addr: usize, out: &mut [f64]) -> usize {
        let count = out.len().min(self.limit.saturating_sub(addr));
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = if i < count {
                self.slots.get(addr + i).copied().unwrap_or(0.0)
            } else {
                0.0
            };
        }
        count
    }

    fn write_memory(&mut self, addr: usize, values: &[f64]) -> usize {
        let count = values.len().min(self.limit.saturating_sub(addr));
        if count == 0 {
            return 0;
        }
        if self.slots.len() < addr + count {
            self.slots.resize(addr + count, 0.0);
        }
        self.slots[addr..addr + count].copy_from_slice(&values[..count]);
        count
    }

    fn string(&self, id: f64) -> Option<String> {
        Self::string_key(id).and_then(|key| self.strings.get(&key).cloned())
    }

    fn set_string(&mut self, id: f64, value: &str) -> bool {
        match Self::string_key(id) {
            Some(key) if key < USER_STRING_SLOTS || self.strings.contains_key(&key) => {
                self.strings.insert(key, value.to_string());
                true
            }
            _ => false,
        }
    }
}

/// Reference implementation of [`Vm`]
#[derive(Debug)]
pub struct MiniVm {
    vars: HashMap<String, Var>,
    registered: HashSet<String>,
    memory: MiniMemory,
    programs: HashMap<u64, Vec<Expr>>,
    next_code: u64,
    global_memory: Option<String>,
}

impl Default for MiniVm {
    fn default() -> Self {
        Self::new()
    }
}

impl MiniVm {
    pub fn new() -> Self {
        Self {
            vars: HashMap::new(),
            registered: HashSet::new(),
            memory: MiniMemory::new(),
            programs: HashMap::new(),
            next_code: 1,
            global_memory: None,
        }
    }

    /// Current value of variable `name`, if it exists
    pub fn variable(&self, name: &str) -> Option<f64> {
        self.vars.get(name).map(|v| v.get())
    }

    /// Number of compiled programs not yet freed
    pub fn live_code_count(&self) -> usize {
        self.programs.len()
    }

    pub fn memory_limit(&self) -> usize {
        self.memory.limit
    }

    pub fn global_memory_name(&self) -> Option<&str> {
        self.global_memory.as_deref()
    }
}

impl VmAccess for MiniVm {
    fn read_memory(&self, addr: usize, out: &mut [f64]) -> usize {
        self.memory.read_memory(addr, out)
    }

    fn write_memory(&mut self, addr: usize, values: &[f64]) -> usize {
        self.memory.write_memory(addr, values)
    }

    fn string(&self, id: f64) -> Option<String> {
        self.memory.string(id)
    }

    fn set_string(&mut self, id: f64, value: &str) -> bool {
        self.memory.set_string(id, value)
    }
}

impl Vm for MiniVm {
    fn set_memory_limit(&mut self, slots: usize) {
        self.memory.limit = slots;
        self.memory.slots.truncate(slots);
    }

    fn set_global_memory_name(&mut self, name: Option<&str>) {
        self.global_memory = name.map(str::to_string);
    }

    fn register_variable(&mut self, name: &str) -> Var {
        self.registered.insert(name.to_string());
        Arc::clone(self.vars.entry(name.to_string()).or_insert_with(|| new_var(0.0)))
    }

    fn compile(
        &mut self,
        source: &str,
        line_offset: usize,
        symbols: &dyn SymbolResolver,
    ) -> Result<CodeHandle, String> {
        let report = |(line, message): (usize, String)| format!("line {}: {}", line_offset + line + 1, message);
        let tokens = tokenize(source).map_err(report)?;
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            linker: Linker {
                vars: &mut self.vars,
                symbols,
                memory: &mut self.memory,
            },
        };
        let program = parser.program().map_err(report)?;

        let id = self.next_code;
        self.next_code += 1;
        self.programs.insert(id, program);
        Ok(CodeHandle::new(id))
    }

    fn execute(&mut self, code: &CodeHandle, host: &mut dyn ScriptHost) {
        let Some(program) = self.programs.get(&code.id()) else {
            return;
        };
        let memory = &mut self.memory;
        for statement in program {
            eval(statement, host, memory);
        }
    }

    fn free_code(&mut self, code: CodeHandle) {
        self.programs.remove(&code.id());
    }

    fn reset(&mut self) {
        let registered = &self.registered;
        self.vars.retain(|name, _| registered.contains(name));
        self.memory.slots.clear();
        self.memory.strings.retain(|key, _| *key >= USER_STRING_SLOTS);
    }
}

fn eval(expr: &Expr, host: &mut dyn ScriptHost, memory: &mut MiniMemory) -> f64 {
    match expr {
        Expr::Num(value) => *value,
        Expr::Var(var) => var.get(),
        Expr::Index(base, index) => {
            let addr = eval(base, host, memory) + eval(index, host, memory);
            memory.read_slot(addr.floor())
        }
        Expr::Neg(inner) => -eval(inner, host, memory),
        Expr::Bin(op, lhs, rhs) => {
            let a = eval(lhs, host, memory);
            let b = eval(rhs, host, memory);
            let truth = |c: bool| if c { 1.0 } else { 0.0 };
            match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                BinOp::Div => a / b,
                BinOp::Eq => truth(a == b),
                BinOp::Ne => truth(a != b),
                BinOp::Lt => truth(a < b),
                BinOp::Le => truth(a <= b),
                BinOp::Gt => truth(a > b),
                BinOp::Ge => truth(a >= b),
            }
        }
        Expr::Call(name, args) => {
            let args: Vec<ArgRef> = args
                .iter()
                .map(|arg| match arg {
                    Expr::Var(var) => ArgRef::var(Arc::clone(var)),
                    other => ArgRef::value(eval(other, host, memory)),
                })
                .collect();
            host.call(name, &args, memory).unwrap_or(0.0)
        }
        Expr::AssignVar(var, value) => {
            let value = eval(value, host, memory);
            var.set(value);
            value
        }
        Expr::AssignMem(base, index, value) => {
            let addr = eval(base, host, memory) + eval(index, host, memory);
            let value = eval(value, host, memory);
            memory.write_slot(addr.floor(), value);
            value
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::NoSymbols;

    struct Recorder {
        calls: Vec<(String, Vec<f64>)>,
    }

    impl ScriptHost for Recorder {
        fn call(&mut self, name: &str, args: &[ArgRef], _vm: &mut dyn VmAccess) -> Option<f64> {
            self.calls.push((name.to_string(), args.iter().map(|a| a.value).collect()));
            if name == "store" {
                args[0].set(42.0);
            }
            Some(1.0)
        }
    }

    fn run(vm: &mut MiniVm, source: &str) -> Recorder {
        let code = vm.compile(source, 0, &NoSymbols).unwrap();
        let mut host = Recorder { calls: Vec::new() };
        vm.execute(&code, &mut host);
        vm.free_code(code);
        host
    }

    #[test]
    fn test_arithmetic_and_assignment() {
        let mut vm = MiniVm::new();
        run(&mut vm, "a = 2 + 3 * 4; b = (a - 4) / 2; c = -b; d = a > 10;");
        assert_eq!(vm.variable("a"), Some(14.0));
        assert_eq!(vm.variable("b"), Some(5.0));
        assert_eq!(vm.variable("c"), Some(-5.0));
        assert_eq!(vm.variable("d"), Some(1.0));
    }

    #[test]
    fn test_memory_indexing() {
        let mut vm = MiniVm::new();
        run(&mut vm, "buf = 100; buf[2] = 7; x = buf[2] + buf[3];");
        assert_eq!(vm.variable("x"), Some(7.0));
        let mut out = [0.0; 1];
        vm.read_memory(102, &mut out);
        assert_eq!(out[0], 7.0);
    }

    #[test]
    fn test_host_calls_write_through_variables() {
        let mut vm = MiniVm::new();
        let host = run(&mut vm, "r = store(v, 3);");
        assert_eq!(host.calls, vec![("store".to_string(), vec![0.0, 3.0])]);
        assert_eq!(vm.variable("v"), Some(42.0));
        assert_eq!(vm.variable("r"), Some(1.0));
    }

    #[test]
    fn test_string_literals() {
        let mut vm = MiniVm::new();
        run(&mut vm, "s = \"hello\";");
        let id = vm.variable("s").unwrap();
        assert_eq!(vm.string(id).as_deref(), Some("hello"));
        assert!(vm.set_string(id, "bye"));
        assert_eq!(vm.string(id).as_deref(), Some("bye"));
        assert!(vm.string(5.0).is_none());
        assert!(vm.set_string(5.0, "slot"));
    }

    #[test]
    fn test_compile_error_reports_line() {
        let mut vm = MiniVm::new();
        let err = vm.compile("a = 1;\nb = ;\n", 10, &NoSymbols).unwrap_err();
        assert!(err.starts_with("line 12:"), "{}", err);
        assert_eq!(vm.live_code_count(), 0);
    }

    #[test]
    fn test_comments_are_skipped() {
        let mut vm = MiniVm::new();
        run(&mut vm, "// note\na = 1; /* multi\nline */ b = 2;");
        assert_eq!(vm.variable("b"), Some(2.0));
    }

    #[test]
    fn test_memory_limit() {
        let mut vm = MiniVm::new();
        vm.set_memory_limit(4);
        assert_eq!(vm.write_memory(2, &[1.0, 2.0, 3.0]), 2);
        assert_eq!(vm.write_memory(10, &[1.0]), 0);
    }

    #[test]
    fn test_reset_keeps_registered_variables() {
        let mut vm = MiniVm::new();
        let registered = vm.register_variable("spl0");
        run(&mut vm, "spl0 = 1; tmp = 2;");
        vm.reset();
        assert_eq!(vm.variable("tmp"), None);
        assert_eq!(registered.get(), 1.0);
    }
}
