//! Binary module reader
//!
//! Decodes a binary-encoded module into a `DefinedModule`, linking function
//! imports against the environment's registry as it goes. Decoding is
//! all-or-nothing: any malformed input fails the load, appends a diagnostic
//! to the caller's sink, and leaves the environment untouched.

pub mod leb128;

use hashbrown::HashMap;
use indexmap::IndexMap;
use tracing::debug;

use crate::engine::environment::Environment;
use crate::engine::errors::LoadError;
use crate::engine::features::Features;
use crate::engine::instr::{BlockType, Instr};
use crate::engine::module::{
    DefinedModule, Export, ExternalKind, FuncRef, FuncType, Function, ModuleId,
};
use crate::engine::value::ValueType;
use crate::util::Errors;

const MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6D];
const VERSION: u32 = 1;

const SECTION_CUSTOM: u8 = 0;
const SECTION_TYPE: u8 = 1;
const SECTION_IMPORT: u8 = 2;
const SECTION_FUNCTION: u8 = 3;
const SECTION_EXPORT: u8 = 7;
const SECTION_CODE: u8 = 10;

/// Options for `read_binary`
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadBinaryOptions {
    /// Decode and retain the `name` custom section for richer diagnostics
    pub read_debug_names: bool,
    pub features: Features,
}

/// Decode `bytes` into the environment, returning the new module's id.
///
/// On error the failure is also appended to `errors` and the environment's
/// module set is unchanged.
pub fn read_binary(
    env: &mut Environment,
    bytes: &[u8],
    options: &ReadBinaryOptions,
    errors: &mut Errors,
) -> Result<ModuleId, LoadError> {
    debug!("reading binary module, {} bytes", bytes.len());
    let mut decoder = Decoder::new(env, bytes, options);
    match decoder.decode_module() {
        Ok(module) => {
            let id = env.add_module(module);
            debug!("loaded module {:?}", id);
            Ok(id)
        }
        Err(err) => {
            errors.error(err.to_string());
            Err(err)
        }
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn read_byte(&mut self) -> Result<u8, LoadError> {
        let byte = *self
            .bytes
            .get(self.pos)
            .ok_or(LoadError::UnexpectedEof(self.pos))?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_exact(
        &mut self,
        len: usize,
    ) -> Result<&'a [u8], LoadError> {
        if self.remaining() < len {
            return Err(LoadError::UnexpectedEof(self.pos));
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_u32_le(&mut self) -> Result<u32, LoadError> {
        let bytes = self.read_exact(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_var_u32(&mut self) -> Result<u32, LoadError> {
        let (value, len) = leb128::decode_unsigned(&self.bytes[self.pos..], 32)
            .ok_or(LoadError::UnexpectedEof(self.pos))?;
        self.pos += len;
        Ok(value as u32)
    }

    fn read_var_i32(&mut self) -> Result<i32, LoadError> {
        let (value, len) = leb128::decode_signed(&self.bytes[self.pos..], 32)
            .ok_or(LoadError::UnexpectedEof(self.pos))?;
        self.pos += len;
        Ok(value as i32)
    }

    fn read_var_i64(&mut self) -> Result<i64, LoadError> {
        let (value, len) = leb128::decode_signed(&self.bytes[self.pos..], 64)
            .ok_or(LoadError::UnexpectedEof(self.pos))?;
        self.pos += len;
        Ok(value)
    }

    fn read_f32_bits(&mut self) -> Result<u32, LoadError> {
        let bytes = self.read_exact(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_f64_bits(&mut self) -> Result<u64, LoadError> {
        let bytes = self.read_exact(8)?;
        Ok(u64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]))
    }

    fn read_name(&mut self) -> Result<String, LoadError> {
        let offset = self.pos;
        let len = self.read_var_u32()? as usize;
        let bytes = self.read_exact(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| LoadError::Malformed {
            what: "utf-8 name",
            offset,
        })
    }

    fn read_value_type(&mut self) -> Result<ValueType, LoadError> {
        let offset = self.pos;
        let byte = self.read_byte()?;
        ValueType::from_byte(byte).ok_or(LoadError::Malformed {
            what: "value type",
            offset,
        })
    }
}

struct Decoder<'a, 'e> {
    env: &'e Environment,
    reader: Reader<'a>,
    features: Features,
    read_debug_names: bool,
    types: Vec<FuncType>,
    functions: Vec<Function>,
    import_count: usize,
    exports: IndexMap<String, Export>,
    func_names: HashMap<u32, String>,
}

impl<'a, 'e> Decoder<'a, 'e> {
    fn new(
        env: &'e Environment,
        bytes: &'a [u8],
        options: &ReadBinaryOptions,
    ) -> Self {
        Self {
            env,
            reader: Reader::new(bytes),
            features: options.features,
            read_debug_names: options.read_debug_names,
            types: Vec::new(),
            functions: Vec::new(),
            import_count: 0,
            exports: IndexMap::new(),
            func_names: HashMap::new(),
        }
    }

    fn decode_module(&mut self) -> Result<DefinedModule, LoadError> {
        let magic = self.reader.read_exact(4)?;
        if magic != MAGIC {
            return Err(LoadError::BadMagic);
        }
        let version = self.reader.read_u32_le()?;
        if version != VERSION {
            return Err(LoadError::BadVersion(version));
        }

        let mut last_section: u8 = 0;
        let mut code_count: Option<u32> = None;
        while self.reader.remaining() > 0 {
            let id = self.reader.read_byte()?;
            let size = self.reader.read_var_u32()? as usize;
            let section_end = self
                .reader
                .pos
                .checked_add(size)
                .filter(|end| *end <= self.reader.bytes.len())
                .ok_or(LoadError::UnexpectedEof(self.reader.pos))?;

            if id != SECTION_CUSTOM {
                if id <= last_section {
                    return Err(LoadError::Malformed {
                        what: "section order",
                        offset: self.reader.pos,
                    });
                }
                last_section = id;
            }

            match id {
                SECTION_CUSTOM => self.decode_custom_section(section_end)?,
                SECTION_TYPE => self.decode_type_section()?,
                SECTION_IMPORT => self.decode_import_section()?,
                SECTION_FUNCTION => self.decode_function_section()?,
                SECTION_EXPORT => self.decode_export_section()?,
                SECTION_CODE => {
                    code_count = Some(self.decode_code_section()?);
                }
                // Sections this reader has no use for are skipped whole
                _ => {
                    self.reader.pos = section_end;
                }
            }

            if self.reader.pos != section_end {
                return Err(LoadError::SectionOverrun { id });
            }
        }

        let defined_count = (self.functions.len() - self.import_count) as u32;
        if code_count.unwrap_or(0) != defined_count {
            return Err(LoadError::Malformed {
                what: "code section count",
                offset: self.reader.pos,
            });
        }

        Ok(DefinedModule {
            // The owning environment assigns the real id
            id: ModuleId::default(),
            types: std::mem::take(&mut self.types),
            functions: std::mem::take(&mut self.functions),
            exports: std::mem::take(&mut self.exports),
            func_names: std::mem::take(&mut self.func_names),
        })
    }

    fn decode_type_section(&mut self) -> Result<(), LoadError> {
        let count = self.reader.read_var_u32()?;
        for i in 0..count {
            let offset = self.reader.pos;
            let form = self.reader.read_byte()?;
            if form != 0x60 {
                return Err(LoadError::Malformed {
                    what: "func type form",
                    offset,
                });
            }
            let param_count = self.reader.read_var_u32()?;
            let mut params = Vec::with_capacity(param_count as usize);
            for _ in 0..param_count {
                params.push(self.reader.read_value_type()?);
            }
            let result_count = self.reader.read_var_u32()?;
            if result_count > 1 && !self.features.multi_value_enabled() {
                return Err(LoadError::MultiValueDisabled(i));
            }
            let mut results = Vec::with_capacity(result_count as usize);
            for _ in 0..result_count {
                results.push(self.reader.read_value_type()?);
            }
            self.types.push(FuncType { params, results });
        }
        Ok(())
    }

    fn decode_import_section(&mut self) -> Result<(), LoadError> {
        let count = self.reader.read_var_u32()?;
        for _ in 0..count {
            let module = self.reader.read_name()?;
            let field = self.reader.read_name()?;
            let kind_offset = self.reader.pos;
            let kind = self.reader.read_byte()?;
            match ExternalKind::from_byte(kind) {
                Some(ExternalKind::Func) => {
                    let type_idx = self.reader.read_var_u32()?;
                    if type_idx as usize >= self.types.len() {
                        return Err(LoadError::TypeIndexOutOfRange(type_idx));
                    }
                    let target = self.link_func_import(&module, &field, type_idx)?;
                    self.functions.push(Function::Imported { type_idx, target });
                    self.import_count += 1;
                }
                Some(_) => {
                    return Err(LoadError::UnsupportedImport { module, field });
                }
                None => {
                    return Err(LoadError::Malformed {
                        what: "import kind",
                        offset: kind_offset,
                    });
                }
            }
        }
        Ok(())
    }

    /// Resolve a function import against the environment registry
    fn link_func_import(
        &self,
        module: &str,
        field: &str,
        type_idx: u32,
    ) -> Result<FuncRef, LoadError> {
        let unknown = || LoadError::UnknownImport {
            module: module.to_string(),
            field: field.to_string(),
        };
        let target_id = self.env.registered(module).ok_or_else(unknown)?;
        let target_module = self.env.module(target_id).ok_or_else(unknown)?;
        let export = target_module.exports.get(field).ok_or_else(unknown)?;
        if export.kind != ExternalKind::Func {
            return Err(unknown());
        }
        let actual = target_module
            .func_type(export.index)
            .ok_or_else(unknown)?;
        if *actual != self.types[type_idx as usize] {
            return Err(LoadError::ImportTypeMismatch {
                module: module.to_string(),
                field: field.to_string(),
            });
        }
        Ok(FuncRef {
            module: target_id,
            index: export.index,
        })
    }

    fn decode_function_section(&mut self) -> Result<(), LoadError> {
        let count = self.reader.read_var_u32()?;
        for _ in 0..count {
            let type_idx = self.reader.read_var_u32()?;
            if type_idx as usize >= self.types.len() {
                return Err(LoadError::TypeIndexOutOfRange(type_idx));
            }
            self.functions.push(Function::Defined {
                type_idx,
                locals: Vec::new(),
                code: Vec::new(),
            });
        }
        Ok(())
    }

    fn decode_export_section(&mut self) -> Result<(), LoadError> {
        let count = self.reader.read_var_u32()?;
        for _ in 0..count {
            let offset = self.reader.pos;
            let name = self.reader.read_name()?;
            let kind_byte = self.reader.read_byte()?;
            let kind = ExternalKind::from_byte(kind_byte).ok_or(LoadError::Malformed {
                what: "export kind",
                offset,
            })?;
            let index = self.reader.read_var_u32()?;
            if kind == ExternalKind::Func && index as usize >= self.functions.len() {
                return Err(LoadError::FuncIndexOutOfRange(index));
            }
            if self.exports.insert(name, Export { kind, index }).is_some() {
                return Err(LoadError::Malformed {
                    what: "duplicate export name",
                    offset,
                });
            }
        }
        Ok(())
    }

    fn decode_code_section(&mut self) -> Result<u32, LoadError> {
        let count = self.reader.read_var_u32()?;
        for i in 0..count {
            let body_size = self.reader.read_var_u32()? as usize;
            let body_end = self
                .reader
                .pos
                .checked_add(body_size)
                .filter(|end| *end <= self.reader.bytes.len())
                .ok_or(LoadError::UnexpectedEof(self.reader.pos))?;

            let mut locals = Vec::new();
            let local_groups = self.reader.read_var_u32()?;
            for _ in 0..local_groups {
                let n = self.reader.read_var_u32()?;
                let ty = self.reader.read_value_type()?;
                for _ in 0..n {
                    locals.push(ty);
                }
            }

            let code = self.decode_body()?;
            if self.reader.pos != body_end {
                return Err(LoadError::Malformed {
                    what: "function body size",
                    offset: self.reader.pos,
                });
            }

            let func_idx = self.import_count + i as usize;
            match self.functions.get_mut(func_idx) {
                Some(Function::Defined {
                    locals: slot_locals,
                    code: slot_code,
                    ..
                }) => {
                    *slot_locals = locals;
                    *slot_code = code;
                }
                _ => {
                    return Err(LoadError::Malformed {
                        what: "code entry without function declaration",
                        offset: self.reader.pos,
                    });
                }
            }
        }
        Ok(count)
    }

    fn read_block_type(&mut self) -> Result<BlockType, LoadError> {
        let offset = self.reader.pos;
        let byte = self.reader.read_byte()?;
        if byte == 0x40 {
            return Ok(BlockType::Empty);
        }
        ValueType::from_byte(byte)
            .map(BlockType::Value)
            .ok_or(LoadError::Malformed {
                what: "block type",
                offset,
            })
    }

    /// Decode one function body, patching structured-control targets
    fn decode_body(&mut self) -> Result<Vec<Instr>, LoadError> {
        let mut code: Vec<Instr> = Vec::new();
        // Open structured instructions: (index of Block/Loop/If, index of Else)
        let mut open: Vec<(usize, Option<usize>)> = Vec::new();

        loop {
            let opcode = self.reader.read_byte()?;
            let instr = match opcode {
                0x00 => Instr::Unreachable,
                0x01 => Instr::Nop,
                0x02 => {
                    let ty = self.read_block_type()?;
                    open.push((code.len(), None));
                    Instr::Block { ty, end: 0 }
                }
                0x03 => {
                    let ty = self.read_block_type()?;
                    open.push((code.len(), None));
                    Instr::Loop { ty, end: 0 }
                }
                0x04 => {
                    let ty = self.read_block_type()?;
                    open.push((code.len(), None));
                    Instr::If {
                        ty,
                        else_: 0,
                        end: 0,
                    }
                }
                0x05 => {
                    let top = open.last_mut().ok_or(LoadError::Malformed {
                        what: "else without if",
                        offset: self.reader.pos,
                    })?;
                    if !matches!(code[top.0], Instr::If { .. }) || top.1.is_some() {
                        return Err(LoadError::Malformed {
                            what: "else without if",
                            offset: self.reader.pos,
                        });
                    }
                    top.1 = Some(code.len());
                    Instr::Else { end: 0 }
                }
                0x0B => {
                    let end_idx = code.len() as u32;
                    code.push(Instr::End);
                    match open.pop() {
                        Some((head, else_idx)) => {
                            self.patch_block(&mut code, head, else_idx, end_idx);
                            continue;
                        }
                        // Depth-zero end closes the function body
                        None => return Ok(code),
                    }
                }
                0x0C => Instr::Br {
                    depth: self.reader.read_var_u32()?,
                },
                0x0D => Instr::BrIf {
                    depth: self.reader.read_var_u32()?,
                },
                0x0F => Instr::Return,
                0x10 => {
                    let func = self.reader.read_var_u32()?;
                    if func as usize >= self.functions.len() {
                        return Err(LoadError::FuncIndexOutOfRange(func));
                    }
                    Instr::Call { func }
                }

                0x1A => Instr::Drop,
                0x1B => Instr::Select,

                0x20 => Instr::LocalGet {
                    local: self.reader.read_var_u32()?,
                },
                0x21 => Instr::LocalSet {
                    local: self.reader.read_var_u32()?,
                },
                0x22 => Instr::LocalTee {
                    local: self.reader.read_var_u32()?,
                },

                0x41 => Instr::I32Const {
                    value: self.reader.read_var_i32()? as u32,
                },
                0x42 => Instr::I64Const {
                    value: self.reader.read_var_i64()? as u64,
                },
                0x43 => Instr::F32Const {
                    bits: self.reader.read_f32_bits()?,
                },
                0x44 => Instr::F64Const {
                    bits: self.reader.read_f64_bits()?,
                },

                0x45 => Instr::I32Eqz,
                0x46 => Instr::I32Eq,
                0x47 => Instr::I32Ne,
                0x48 => Instr::I32LtS,
                0x49 => Instr::I32LtU,
                0x4A => Instr::I32GtS,
                0x4B => Instr::I32GtU,
                0x4C => Instr::I32LeS,
                0x4D => Instr::I32LeU,
                0x4E => Instr::I32GeS,
                0x4F => Instr::I32GeU,

                0x50 => Instr::I64Eqz,
                0x51 => Instr::I64Eq,
                0x52 => Instr::I64Ne,
                0x53 => Instr::I64LtS,
                0x54 => Instr::I64LtU,
                0x55 => Instr::I64GtS,
                0x56 => Instr::I64GtU,
                0x57 => Instr::I64LeS,
                0x58 => Instr::I64LeU,
                0x59 => Instr::I64GeS,
                0x5A => Instr::I64GeU,

                0x5B => Instr::F32Eq,
                0x5C => Instr::F32Ne,
                0x5D => Instr::F32Lt,
                0x5E => Instr::F32Gt,
                0x5F => Instr::F32Le,
                0x60 => Instr::F32Ge,

                0x61 => Instr::F64Eq,
                0x62 => Instr::F64Ne,
                0x63 => Instr::F64Lt,
                0x64 => Instr::F64Gt,
                0x65 => Instr::F64Le,
                0x66 => Instr::F64Ge,

                0x6A => Instr::I32Add,
                0x6B => Instr::I32Sub,
                0x6C => Instr::I32Mul,
                0x6D => Instr::I32DivS,
                0x6E => Instr::I32DivU,
                0x6F => Instr::I32RemS,
                0x70 => Instr::I32RemU,
                0x71 => Instr::I32And,
                0x72 => Instr::I32Or,
                0x73 => Instr::I32Xor,
                0x74 => Instr::I32Shl,
                0x75 => Instr::I32ShrS,
                0x76 => Instr::I32ShrU,

                0x7C => Instr::I64Add,
                0x7D => Instr::I64Sub,
                0x7E => Instr::I64Mul,
                0x7F => Instr::I64DivS,
                0x80 => Instr::I64DivU,
                0x81 => Instr::I64RemS,
                0x82 => Instr::I64RemU,
                0x83 => Instr::I64And,
                0x84 => Instr::I64Or,
                0x85 => Instr::I64Xor,
                0x86 => Instr::I64Shl,
                0x87 => Instr::I64ShrS,
                0x88 => Instr::I64ShrU,

                0x8B => Instr::F32Abs,
                0x8C => Instr::F32Neg,
                0x91 => Instr::F32Sqrt,
                0x92 => Instr::F32Add,
                0x93 => Instr::F32Sub,
                0x94 => Instr::F32Mul,
                0x95 => Instr::F32Div,
                0x96 => Instr::F32Min,
                0x97 => Instr::F32Max,

                0x99 => Instr::F64Abs,
                0x9A => Instr::F64Neg,
                0x9F => Instr::F64Sqrt,
                0xA0 => Instr::F64Add,
                0xA1 => Instr::F64Sub,
                0xA2 => Instr::F64Mul,
                0xA3 => Instr::F64Div,
                0xA4 => Instr::F64Min,
                0xA5 => Instr::F64Max,

                0xA7 => Instr::I32WrapI64,
                0xAC => Instr::I64ExtendI32S,
                0xAD => Instr::I64ExtendI32U,
                0xB6 => Instr::F32DemoteF64,
                0xBB => Instr::F64PromoteF32,
                0xBC => Instr::I32ReinterpretF32,
                0xBD => Instr::I64ReinterpretF64,
                0xBE => Instr::F32ReinterpretI32,
                0xBF => Instr::F64ReinterpretI64,

                0xC0..=0xC4 => {
                    if !self.features.sign_extension_enabled() {
                        return Err(LoadError::FeatureDisabled {
                            opcode,
                            feature: "sign_extension",
                        });
                    }
                    match opcode {
                        0xC0 => Instr::I32Extend8S,
                        0xC1 => Instr::I32Extend16S,
                        0xC2 => Instr::I64Extend8S,
                        0xC3 => Instr::I64Extend16S,
                        _ => Instr::I64Extend32S,
                    }
                }

                other => return Err(LoadError::UnknownOpcode(other)),
            };
            code.push(instr);
        }
    }

    fn patch_block(
        &self,
        code: &mut [Instr],
        head: usize,
        else_idx: Option<usize>,
        end_idx: u32,
    ) {
        match &mut code[head] {
            Instr::Block { end, .. } | Instr::Loop { end, .. } => *end = end_idx,
            Instr::If { else_, end, .. } => {
                *end = end_idx;
                *else_ = match else_idx {
                    Some(e) => e as u32 + 1,
                    None => end_idx,
                };
            }
            _ => unreachable!("open stack only holds structured instructions"),
        }
        if let Some(e) = else_idx {
            if let Instr::Else { end } = &mut code[e] {
                *end = end_idx;
            }
        }
    }

    fn decode_custom_section(
        &mut self,
        section_end: usize,
    ) -> Result<(), LoadError> {
        let name = self.reader.read_name()?;
        if name == "name" && self.read_debug_names {
            self.decode_name_section(section_end)?;
        }
        // Unknown custom sections (and name data we were not asked to keep)
        // are skipped without validation
        self.reader.pos = section_end;
        Ok(())
    }

    fn decode_name_section(
        &mut self,
        section_end: usize,
    ) -> Result<(), LoadError> {
        while self.reader.pos < section_end {
            let id = self.reader.read_byte()?;
            let size = self.reader.read_var_u32()? as usize;
            let sub_end = self
                .reader
                .pos
                .checked_add(size)
                .filter(|end| *end <= section_end)
                .ok_or(LoadError::UnexpectedEof(self.reader.pos))?;

            // Subsection 1 carries function names; everything else is skipped
            if id == 1 {
                let count = self.reader.read_var_u32()?;
                for _ in 0..count {
                    let func_idx = self.reader.read_var_u32()?;
                    let name = self.reader.read_name()?;
                    self.func_names.insert(func_idx, name);
                }
            }
            self.reader.pos = sub_end;
        }
        Ok(())
    }
}
