//! Export invocation
//!
//! A stack machine over decoded instructions. One executor runs one export
//! at a time, synchronously, to completion or trap; it holds only
//! configuration between calls and borrows the environment per call, so it
//! must never outlive the environment it is bound to.

use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::engine::environment::Environment;
use crate::engine::errors::{InvokeError, TrapKind};
use crate::engine::instr::Instr;
use crate::engine::module::{ExternalKind, FuncRef, Function, ModuleId};
use crate::engine::value::Value;

/// Return values of a completed invocation
pub type ReturnValues = SmallVec<[Value; 4]>;

/// Outcome of `run_export`
pub type ExecOutcome = Result<ReturnValues, InvokeError>;

/// Executor limits
#[derive(Debug, Clone, Copy)]
pub struct ExecutorConfig {
    /// Maximum operand stack depth in values
    pub value_stack_size: usize,
    /// Maximum nested call depth
    pub max_call_depth: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            value_stack_size: 64 * 1024,
            max_call_depth: 1024,
        }
    }
}

/// Runs exported functions within an environment
#[derive(Debug, Default)]
pub struct Executor {
    config: ExecutorConfig,
}

impl Executor {
    pub fn new() -> Executor {
        Executor::default()
    }

    pub fn with_config(config: ExecutorConfig) -> Executor {
        Executor { config }
    }

    /// Invoke an export by exact name with the given arguments.
    ///
    /// Blocks until the call completes or traps; there is no preemption,
    /// so a non-terminating export blocks the calling thread indefinitely.
    pub fn run_export(
        &mut self,
        env: &Environment,
        module_id: ModuleId,
        name: &str,
        args: &[Value],
    ) -> ExecOutcome {
        let module = env.module(module_id).ok_or(InvokeError::InvalidModule)?;
        let export = module
            .exports
            .get(name)
            .ok_or_else(|| InvokeError::UnknownExport(name.to_string()))?;
        if export.kind != ExternalKind::Func {
            return Err(InvokeError::NotAFunction(name.to_string()));
        }

        let func_ty = module
            .func_type(export.index)
            .ok_or_else(|| InvokeError::UnknownExport(name.to_string()))?;
        if args.len() != func_ty.params.len() {
            return Err(InvokeError::ArityMismatch {
                expected: func_ty.params.len(),
                got: args.len(),
            });
        }
        for (index, (arg, expected)) in args.iter().zip(&func_ty.params).enumerate() {
            if arg.value_type() != *expected {
                return Err(InvokeError::ArgumentTypeMismatch {
                    index,
                    expected: *expected,
                    got: arg.value_type(),
                });
            }
        }

        debug!("invoking export {:?} with {} arg(s)", name, args.len());
        let entry = FuncRef {
            module: module_id,
            index: export.index,
        };
        let mut interp = Interp {
            env,
            config: self.config,
            value_stack: Vec::new(),
            frames: Vec::new(),
        };
        for arg in args {
            // Entry arguments cannot overflow a fresh stack
            interp.value_stack.push(*arg);
        }
        if let Err(kind) = interp.call(entry).and_then(|_| interp.run()) {
            let func = interp.trap_site(entry);
            debug!("export {:?} trapped: {}", name, kind);
            return Err(InvokeError::Trap { kind, func });
        }

        Ok(interp.value_stack.drain(..).collect())
    }
}

/// One structured-control scope inside a frame
#[derive(Debug, Clone, Copy)]
struct ControlFrame {
    is_loop: bool,
    /// First instruction of the scope body (loop re-entry point)
    start: usize,
    /// Index of the matching `End`
    end: usize,
    /// Operand stack height at entry
    height: usize,
    /// Values a branch out of this scope carries
    arity: usize,
}

/// One function activation
#[derive(Debug)]
struct Frame {
    func: FuncRef,
    pc: usize,
    locals: Vec<Value>,
    /// Operand stack height at function entry (after argument transfer)
    value_base: usize,
    control: Vec<ControlFrame>,
    result_arity: usize,
}

struct Interp<'e> {
    env: &'e Environment,
    config: ExecutorConfig,
    value_stack: Vec<Value>,
    frames: Vec<Frame>,
}

impl<'e> Interp<'e> {
    /// Best-effort function name for trap messages
    fn trap_site(
        &self,
        entry: FuncRef,
    ) -> String {
        let func = self.frames.last().map(|f| f.func).unwrap_or(entry);
        match self.env.module(func.module) {
            Some(module) => module.func_display_name(func.index),
            None => format!("func[{}]", func.index),
        }
    }

    /// Resolve a function reference through import links
    fn resolve(
        &self,
        mut func: FuncRef,
    ) -> (FuncRef, &'e Function) {
        loop {
            let module = self
                .env
                .module(func.module)
                .expect("function reference into a live environment");
            match &module.functions[func.index as usize] {
                Function::Imported { target, .. } => func = *target,
                defined => return (func, defined),
            }
        }
    }

    /// Push a new activation for `func`, moving its arguments off the stack
    fn call(
        &mut self,
        func: FuncRef,
    ) -> Result<(), TrapKind> {
        if self.frames.len() >= self.config.max_call_depth {
            return Err(TrapKind::CallStackExhausted);
        }
        let (func, function) = self.resolve(func);
        let module = self
            .env
            .module(func.module)
            .expect("resolved reference into a live environment");
        let (type_idx, local_types) = match function {
            Function::Defined {
                type_idx, locals, ..
            } => (*type_idx, locals),
            Function::Imported { .. } => unreachable!("resolve() returns defined functions"),
        };
        let ty = &module.types[type_idx as usize];

        let param_count = ty.params.len();
        if self.value_stack.len() < param_count {
            return Err(TrapKind::TypeMismatch);
        }
        let base = self.value_stack.len() - param_count;
        let mut locals: Vec<Value> = self.value_stack.split_off(base);
        for (param, expected) in locals.iter().zip(&ty.params) {
            if param.value_type() != *expected {
                return Err(TrapKind::TypeMismatch);
            }
        }
        locals.extend(local_types.iter().map(|ty| Value::default_of(*ty)));

        trace!(
            "entering {} ({} params, {} locals)",
            module.func_display_name(func.index),
            param_count,
            local_types.len()
        );
        self.frames.push(Frame {
            func,
            pc: 0,
            locals,
            value_base: self.value_stack.len(),
            control: Vec::new(),
            result_arity: ty.results.len(),
        });
        Ok(())
    }

    /// Pop the current activation, carrying its results down. Returns
    /// `false` once the entry frame has returned.
    fn leave(&mut self) -> Result<bool, TrapKind> {
        let frame = self.frames.pop().expect("leave with a live frame");
        if self.value_stack.len() < frame.value_base + frame.result_arity {
            return Err(TrapKind::TypeMismatch);
        }
        let results = self
            .value_stack
            .split_off(self.value_stack.len() - frame.result_arity);
        self.value_stack.truncate(frame.value_base);
        self.value_stack.extend(results);
        Ok(!self.frames.is_empty())
    }

    /// Take the branch with relative `depth` from the current frame
    fn branch(
        &mut self,
        depth: u32,
    ) -> Result<bool, TrapKind> {
        let frame = self.frames.last_mut().expect("branch with a live frame");
        // A depth past every open scope targets the function label itself
        if depth as usize >= frame.control.len() {
            return self.leave();
        }
        let target_i = frame.control.len() - 1 - depth as usize;
        let target = frame.control[target_i];
        if target.is_loop {
            frame.control.truncate(target_i + 1);
            self.value_stack.truncate(target.height);
            frame.pc = target.start;
        } else {
            if self.value_stack.len() < target.height + target.arity {
                return Err(TrapKind::TypeMismatch);
            }
            let carried = self
                .value_stack
                .split_off(self.value_stack.len() - target.arity);
            self.value_stack.truncate(target.height);
            self.value_stack.extend(carried);
            frame.control.truncate(target_i);
            frame.pc = target.end + 1;
        }
        Ok(true)
    }

    fn push(
        &mut self,
        value: Value,
    ) -> Result<(), TrapKind> {
        if self.value_stack.len() >= self.config.value_stack_size {
            return Err(TrapKind::ValueStackExhausted);
        }
        self.value_stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<Value, TrapKind> {
        self.value_stack.pop().ok_or(TrapKind::TypeMismatch)
    }

    fn pop_i32(&mut self) -> Result<u32, TrapKind> {
        self.pop()?.as_i32().ok_or(TrapKind::TypeMismatch)
    }

    fn pop_i64(&mut self) -> Result<u64, TrapKind> {
        self.pop()?.as_i64().ok_or(TrapKind::TypeMismatch)
    }

    fn pop_f32(&mut self) -> Result<f32, TrapKind> {
        self.pop()?.as_f32().ok_or(TrapKind::TypeMismatch)
    }

    fn pop_f64(&mut self) -> Result<f64, TrapKind> {
        self.pop()?.as_f64().ok_or(TrapKind::TypeMismatch)
    }

    fn push_bool(
        &mut self,
        value: bool,
    ) -> Result<(), TrapKind> {
        self.push(Value::I32(value as u32))
    }

    fn i32_binop(
        &mut self,
        op: impl FnOnce(u32, u32) -> Result<u32, TrapKind>,
    ) -> Result<(), TrapKind> {
        let rhs = self.pop_i32()?;
        let lhs = self.pop_i32()?;
        self.push(Value::I32(op(lhs, rhs)?))
    }

    fn i64_binop(
        &mut self,
        op: impl FnOnce(u64, u64) -> Result<u64, TrapKind>,
    ) -> Result<(), TrapKind> {
        let rhs = self.pop_i64()?;
        let lhs = self.pop_i64()?;
        self.push(Value::I64(op(lhs, rhs)?))
    }

    fn i32_cmp(
        &mut self,
        op: impl FnOnce(u32, u32) -> bool,
    ) -> Result<(), TrapKind> {
        let rhs = self.pop_i32()?;
        let lhs = self.pop_i32()?;
        self.push_bool(op(lhs, rhs))
    }

    fn i64_cmp(
        &mut self,
        op: impl FnOnce(u64, u64) -> bool,
    ) -> Result<(), TrapKind> {
        let rhs = self.pop_i64()?;
        let lhs = self.pop_i64()?;
        self.push_bool(op(lhs, rhs))
    }

    fn f32_binop(
        &mut self,
        op: impl FnOnce(f32, f32) -> f32,
    ) -> Result<(), TrapKind> {
        let rhs = self.pop_f32()?;
        let lhs = self.pop_f32()?;
        self.push(Value::from_f32(op(lhs, rhs)))
    }

    fn f32_unop(
        &mut self,
        op: impl FnOnce(f32) -> f32,
    ) -> Result<(), TrapKind> {
        let value = self.pop_f32()?;
        self.push(Value::from_f32(op(value)))
    }

    fn f32_cmp(
        &mut self,
        op: impl FnOnce(f32, f32) -> bool,
    ) -> Result<(), TrapKind> {
        let rhs = self.pop_f32()?;
        let lhs = self.pop_f32()?;
        self.push_bool(op(lhs, rhs))
    }

    fn f64_binop(
        &mut self,
        op: impl FnOnce(f64, f64) -> f64,
    ) -> Result<(), TrapKind> {
        let rhs = self.pop_f64()?;
        let lhs = self.pop_f64()?;
        self.push(Value::from_f64(op(lhs, rhs)))
    }

    fn f64_unop(
        &mut self,
        op: impl FnOnce(f64) -> f64,
    ) -> Result<(), TrapKind> {
        let value = self.pop_f64()?;
        self.push(Value::from_f64(op(value)))
    }

    fn f64_cmp(
        &mut self,
        op: impl FnOnce(f64, f64) -> bool,
    ) -> Result<(), TrapKind> {
        let rhs = self.pop_f64()?;
        let lhs = self.pop_f64()?;
        self.push_bool(op(lhs, rhs))
    }

    fn local(
        &mut self,
        index: u32,
    ) -> Result<&mut Value, TrapKind> {
        let frame = self.frames.last_mut().expect("local access with a live frame");
        frame
            .locals
            .get_mut(index as usize)
            .ok_or(TrapKind::InvalidLocalIndex)
    }

    /// Main dispatch loop
    fn run(&mut self) -> Result<(), TrapKind> {
        loop {
            let instr = {
                let frame = self.frames.last().expect("run with a live frame");
                let module = self
                    .env
                    .module(frame.func.module)
                    .expect("frame function in a live environment");
                match &module.functions[frame.func.index as usize] {
                    Function::Defined { code, .. } => code[frame.pc],
                    Function::Imported { .. } => {
                        unreachable!("frames only hold defined functions")
                    }
                }
            };
            self.frames.last_mut().expect("frame still live").pc += 1;

            match instr {
                // =====================
                // Control
                // =====================
                Instr::Unreachable => return Err(TrapKind::Unreachable),
                Instr::Nop => {}
                Instr::Block { ty, end } => {
                    let frame = self.frames.last_mut().expect("frame");
                    frame.control.push(ControlFrame {
                        is_loop: false,
                        start: frame.pc,
                        end: end as usize,
                        height: self.value_stack.len(),
                        arity: ty.arity(),
                    });
                }
                Instr::Loop { ty: _, end } => {
                    let frame = self.frames.last_mut().expect("frame");
                    // A branch to a loop label re-enters with no operands
                    frame.control.push(ControlFrame {
                        is_loop: true,
                        start: frame.pc,
                        end: end as usize,
                        height: self.value_stack.len(),
                        arity: 0,
                    });
                }
                Instr::If { ty, else_, end } => {
                    let condition = self.pop_i32()?;
                    let frame = self.frames.last_mut().expect("frame");
                    frame.control.push(ControlFrame {
                        is_loop: false,
                        start: frame.pc,
                        end: end as usize,
                        height: self.value_stack.len(),
                        arity: ty.arity(),
                    });
                    if condition == 0 {
                        frame.pc = else_ as usize;
                    }
                }
                Instr::Else { end } => {
                    // Reached only by falling out of the then-arm
                    let frame = self.frames.last_mut().expect("frame");
                    frame.pc = end as usize;
                }
                Instr::End => {
                    let frame = self.frames.last_mut().expect("frame");
                    if frame.control.pop().is_none() && !self.leave()? {
                        return Ok(());
                    }
                }
                Instr::Br { depth } => {
                    if !self.branch(depth)? {
                        return Ok(());
                    }
                }
                Instr::BrIf { depth } => {
                    let condition = self.pop_i32()?;
                    if condition != 0 && !self.branch(depth)? {
                        return Ok(());
                    }
                }
                Instr::Return => {
                    if !self.leave()? {
                        return Ok(());
                    }
                }
                Instr::Call { func } => {
                    let module = self.frames.last().expect("frame").func.module;
                    self.call(FuncRef {
                        module,
                        index: func,
                    })?;
                }

                // =====================
                // Parametric
                // =====================
                Instr::Drop => {
                    self.pop()?;
                }
                Instr::Select => {
                    let condition = self.pop_i32()?;
                    let on_false = self.pop()?;
                    let on_true = self.pop()?;
                    if on_true.value_type() != on_false.value_type() {
                        return Err(TrapKind::TypeMismatch);
                    }
                    self.push(if condition != 0 { on_true } else { on_false })?;
                }

                // =====================
                // Locals
                // =====================
                Instr::LocalGet { local } => {
                    let value = *self.local(local)?;
                    self.push(value)?;
                }
                Instr::LocalSet { local } => {
                    let value = self.pop()?;
                    *self.local(local)? = value;
                }
                Instr::LocalTee { local } => {
                    let value = *self
                        .value_stack
                        .last()
                        .ok_or(TrapKind::TypeMismatch)?;
                    *self.local(local)? = value;
                }

                // =====================
                // Constants
                // =====================
                Instr::I32Const { value } => self.push(Value::I32(value))?,
                Instr::I64Const { value } => self.push(Value::I64(value))?,
                Instr::F32Const { bits } => self.push(Value::F32(bits))?,
                Instr::F64Const { bits } => self.push(Value::F64(bits))?,

                // =====================
                // i32 comparison
                // =====================
                Instr::I32Eqz => {
                    let value = self.pop_i32()?;
                    self.push_bool(value == 0)?;
                }
                Instr::I32Eq => self.i32_cmp(|a, b| a == b)?,
                Instr::I32Ne => self.i32_cmp(|a, b| a != b)?,
                Instr::I32LtS => self.i32_cmp(|a, b| (a as i32) < b as i32)?,
                Instr::I32LtU => self.i32_cmp(|a, b| a < b)?,
                Instr::I32GtS => self.i32_cmp(|a, b| a as i32 > b as i32)?,
                Instr::I32GtU => self.i32_cmp(|a, b| a > b)?,
                Instr::I32LeS => self.i32_cmp(|a, b| a as i32 <= b as i32)?,
                Instr::I32LeU => self.i32_cmp(|a, b| a <= b)?,
                Instr::I32GeS => self.i32_cmp(|a, b| a as i32 >= b as i32)?,
                Instr::I32GeU => self.i32_cmp(|a, b| a >= b)?,

                // =====================
                // i64 comparison
                // =====================
                Instr::I64Eqz => {
                    let value = self.pop_i64()?;
                    self.push_bool(value == 0)?;
                }
                Instr::I64Eq => self.i64_cmp(|a, b| a == b)?,
                Instr::I64Ne => self.i64_cmp(|a, b| a != b)?,
                Instr::I64LtS => self.i64_cmp(|a, b| (a as i64) < b as i64)?,
                Instr::I64LtU => self.i64_cmp(|a, b| a < b)?,
                Instr::I64GtS => self.i64_cmp(|a, b| a as i64 > b as i64)?,
                Instr::I64GtU => self.i64_cmp(|a, b| a > b)?,
                Instr::I64LeS => self.i64_cmp(|a, b| a as i64 <= b as i64)?,
                Instr::I64LeU => self.i64_cmp(|a, b| a <= b)?,
                Instr::I64GeS => self.i64_cmp(|a, b| a as i64 >= b as i64)?,
                Instr::I64GeU => self.i64_cmp(|a, b| a >= b)?,

                // =====================
                // f32 comparison
                // =====================
                Instr::F32Eq => self.f32_cmp(|a, b| a == b)?,
                Instr::F32Ne => self.f32_cmp(|a, b| a != b)?,
                Instr::F32Lt => self.f32_cmp(|a, b| a < b)?,
                Instr::F32Gt => self.f32_cmp(|a, b| a > b)?,
                Instr::F32Le => self.f32_cmp(|a, b| a <= b)?,
                Instr::F32Ge => self.f32_cmp(|a, b| a >= b)?,

                // =====================
                // f64 comparison
                // =====================
                Instr::F64Eq => self.f64_cmp(|a, b| a == b)?,
                Instr::F64Ne => self.f64_cmp(|a, b| a != b)?,
                Instr::F64Lt => self.f64_cmp(|a, b| a < b)?,
                Instr::F64Gt => self.f64_cmp(|a, b| a > b)?,
                Instr::F64Le => self.f64_cmp(|a, b| a <= b)?,
                Instr::F64Ge => self.f64_cmp(|a, b| a >= b)?,

                // =====================
                // i32 arithmetic
                // =====================
                Instr::I32Add => self.i32_binop(|a, b| Ok(a.wrapping_add(b)))?,
                Instr::I32Sub => self.i32_binop(|a, b| Ok(a.wrapping_sub(b)))?,
                Instr::I32Mul => self.i32_binop(|a, b| Ok(a.wrapping_mul(b)))?,
                Instr::I32DivS => self.i32_binop(|a, b| {
                    let (a, b) = (a as i32, b as i32);
                    if b == 0 {
                        return Err(TrapKind::IntegerDivideByZero);
                    }
                    if a == i32::MIN && b == -1 {
                        return Err(TrapKind::IntegerOverflow);
                    }
                    Ok((a / b) as u32)
                })?,
                Instr::I32DivU => self.i32_binop(|a, b| {
                    if b == 0 {
                        return Err(TrapKind::IntegerDivideByZero);
                    }
                    Ok(a / b)
                })?,
                Instr::I32RemS => self.i32_binop(|a, b| {
                    let (a, b) = (a as i32, b as i32);
                    if b == 0 {
                        return Err(TrapKind::IntegerDivideByZero);
                    }
                    Ok(a.wrapping_rem(b) as u32)
                })?,
                Instr::I32RemU => self.i32_binop(|a, b| {
                    if b == 0 {
                        return Err(TrapKind::IntegerDivideByZero);
                    }
                    Ok(a % b)
                })?,
                Instr::I32And => self.i32_binop(|a, b| Ok(a & b))?,
                Instr::I32Or => self.i32_binop(|a, b| Ok(a | b))?,
                Instr::I32Xor => self.i32_binop(|a, b| Ok(a ^ b))?,
                Instr::I32Shl => self.i32_binop(|a, b| Ok(a.wrapping_shl(b)))?,
                Instr::I32ShrS => self.i32_binop(|a, b| Ok(((a as i32).wrapping_shr(b)) as u32))?,
                Instr::I32ShrU => self.i32_binop(|a, b| Ok(a.wrapping_shr(b)))?,

                // =====================
                // i64 arithmetic
                // =====================
                Instr::I64Add => self.i64_binop(|a, b| Ok(a.wrapping_add(b)))?,
                Instr::I64Sub => self.i64_binop(|a, b| Ok(a.wrapping_sub(b)))?,
                Instr::I64Mul => self.i64_binop(|a, b| Ok(a.wrapping_mul(b)))?,
                Instr::I64DivS => self.i64_binop(|a, b| {
                    let (a, b) = (a as i64, b as i64);
                    if b == 0 {
                        return Err(TrapKind::IntegerDivideByZero);
                    }
                    if a == i64::MIN && b == -1 {
                        return Err(TrapKind::IntegerOverflow);
                    }
                    Ok((a / b) as u64)
                })?,
                Instr::I64DivU => self.i64_binop(|a, b| {
                    if b == 0 {
                        return Err(TrapKind::IntegerDivideByZero);
                    }
                    Ok(a / b)
                })?,
                Instr::I64RemS => self.i64_binop(|a, b| {
                    let (a, b) = (a as i64, b as i64);
                    if b == 0 {
                        return Err(TrapKind::IntegerDivideByZero);
                    }
                    Ok(a.wrapping_rem(b) as u64)
                })?,
                Instr::I64RemU => self.i64_binop(|a, b| {
                    if b == 0 {
                        return Err(TrapKind::IntegerDivideByZero);
                    }
                    Ok(a % b)
                })?,
                Instr::I64And => self.i64_binop(|a, b| Ok(a & b))?,
                Instr::I64Or => self.i64_binop(|a, b| Ok(a | b))?,
                Instr::I64Xor => self.i64_binop(|a, b| Ok(a ^ b))?,
                Instr::I64Shl => self.i64_binop(|a, b| Ok(a.wrapping_shl(b as u32)))?,
                Instr::I64ShrS => {
                    self.i64_binop(|a, b| Ok(((a as i64).wrapping_shr(b as u32)) as u64))?
                }
                Instr::I64ShrU => self.i64_binop(|a, b| Ok(a.wrapping_shr(b as u32)))?,

                // =====================
                // f32 arithmetic
                // =====================
                Instr::F32Abs => self.f32_unop(f32::abs)?,
                Instr::F32Neg => self.f32_unop(|a| -a)?,
                Instr::F32Sqrt => self.f32_unop(f32::sqrt)?,
                Instr::F32Add => self.f32_binop(|a, b| a + b)?,
                Instr::F32Sub => self.f32_binop(|a, b| a - b)?,
                Instr::F32Mul => self.f32_binop(|a, b| a * b)?,
                Instr::F32Div => self.f32_binop(|a, b| a / b)?,
                Instr::F32Min => self.f32_binop(fmin_f32)?,
                Instr::F32Max => self.f32_binop(fmax_f32)?,

                // =====================
                // f64 arithmetic
                // =====================
                Instr::F64Abs => self.f64_unop(f64::abs)?,
                Instr::F64Neg => self.f64_unop(|a| -a)?,
                Instr::F64Sqrt => self.f64_unop(f64::sqrt)?,
                Instr::F64Add => self.f64_binop(|a, b| a + b)?,
                Instr::F64Sub => self.f64_binop(|a, b| a - b)?,
                Instr::F64Mul => self.f64_binop(|a, b| a * b)?,
                Instr::F64Div => self.f64_binop(|a, b| a / b)?,
                Instr::F64Min => self.f64_binop(fmin_f64)?,
                Instr::F64Max => self.f64_binop(fmax_f64)?,

                // =====================
                // Conversions
                // =====================
                Instr::I32WrapI64 => {
                    let value = self.pop_i64()?;
                    self.push(Value::I32(value as u32))?;
                }
                Instr::I64ExtendI32S => {
                    let value = self.pop_i32()?;
                    self.push(Value::I64(value as i32 as i64 as u64))?;
                }
                Instr::I64ExtendI32U => {
                    let value = self.pop_i32()?;
                    self.push(Value::I64(value as u64))?;
                }
                Instr::F32DemoteF64 => {
                    let value = self.pop_f64()?;
                    self.push(Value::from_f32(value as f32))?;
                }
                Instr::F64PromoteF32 => {
                    let value = self.pop_f32()?;
                    self.push(Value::from_f64(value as f64))?;
                }
                Instr::I32ReinterpretF32 => {
                    let value = self.pop()?;
                    let bits = match value {
                        Value::F32(bits) => bits,
                        _ => return Err(TrapKind::TypeMismatch),
                    };
                    self.push(Value::I32(bits))?;
                }
                Instr::I64ReinterpretF64 => {
                    let value = self.pop()?;
                    let bits = match value {
                        Value::F64(bits) => bits,
                        _ => return Err(TrapKind::TypeMismatch),
                    };
                    self.push(Value::I64(bits))?;
                }
                Instr::F32ReinterpretI32 => {
                    let bits = self.pop_i32()?;
                    self.push(Value::F32(bits))?;
                }
                Instr::F64ReinterpretI64 => {
                    let bits = self.pop_i64()?;
                    self.push(Value::F64(bits))?;
                }

                // =====================
                // Sign extension
                // =====================
                Instr::I32Extend8S => {
                    let value = self.pop_i32()?;
                    self.push(Value::I32(value as i8 as i32 as u32))?;
                }
                Instr::I32Extend16S => {
                    let value = self.pop_i32()?;
                    self.push(Value::I32(value as i16 as i32 as u32))?;
                }
                Instr::I64Extend8S => {
                    let value = self.pop_i64()?;
                    self.push(Value::I64(value as i8 as i64 as u64))?;
                }
                Instr::I64Extend16S => {
                    let value = self.pop_i64()?;
                    self.push(Value::I64(value as i16 as i64 as u64))?;
                }
                Instr::I64Extend32S => {
                    let value = self.pop_i64()?;
                    self.push(Value::I64(value as i32 as i64 as u64))?;
                }
            }
        }
    }
}

/// `min` with WebAssembly NaN and signed-zero semantics
fn fmin_f32(
    a: f32,
    b: f32,
) -> f32 {
    if a.is_nan() || b.is_nan() {
        f32::NAN
    } else if a == b {
        // -0.0 orders below +0.0
        if a.is_sign_negative() {
            a
        } else {
            b
        }
    } else if a < b {
        a
    } else {
        b
    }
}

fn fmax_f32(
    a: f32,
    b: f32,
) -> f32 {
    if a.is_nan() || b.is_nan() {
        f32::NAN
    } else if a == b {
        if a.is_sign_positive() {
            a
        } else {
            b
        }
    } else if a > b {
        a
    } else {
        b
    }
}

fn fmin_f64(
    a: f64,
    b: f64,
) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else if a == b {
        if a.is_sign_negative() {
            a
        } else {
            b
        }
    } else if a < b {
        a
    } else {
        b
    }
}

fn fmax_f64(
    a: f64,
    b: f64,
) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else if a == b {
        if a.is_sign_positive() {
            a
        } else {
            b
        }
    } else if a > b {
        a
    } else {
        b
    }
}
