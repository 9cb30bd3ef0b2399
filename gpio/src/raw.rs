//! Raw GPIO port driver, accessing the port registers directly.
//!
//! The register layout is the one of the TM4C123 GPIO ports on the APB bus. Each port has its own
//! 4 KiB register block, and the clocks of all ports are gated by the `RCGCGPIO` register of the
//! system control block. Where those blocks sit in physical memory is up to the caller: the
//! TM4C123 addresses are only right on a host that actually maps that peripheral layout, and
//! writing them anywhere else corrupts unrelated memory.
//!
//! | Register | Offset  | Use                                                 |
//! |----------|---------|-----------------------------------------------------|
//! | `DATA`   | `0x3FC` | line levels (address bits 9:2 act as a write mask)  |
//! | `DIR`    | `0x400` | 1 = output                                          |
//! | `PUR`    | `0x510` | pull-up enable                                      |
//! | `PDR`    | `0x514` | pull-down enable                                    |
//! | `DEN`    | `0x51C` | digital enable                                      |
//! | `AMSEL`  | `0x528` | analog mode select                                  |

use crate::{GpioBias, GpioError, GpioPort, GpioResult, LineClaims, PortId};
use log::debug;
use memmap2::{MmapOptions, MmapRaw};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use std::fs::OpenOptions;

/// Offsets of the two register blocks a port needs, within the mapped device.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RegisterBlocks {
    /// The GPIO port registers.
    pub port: u64,
    /// The system control registers, holding `RCGCGPIO`.
    pub sysctl: u64,
}

impl RegisterBlocks {
    /// Blocks of a TM4C123 GPIO port on the APB bus.
    pub fn tm4c123(id: PortId) -> Self {
        let port = match id {
            PortId::A => 0x4000_4000,
            PortId::B => 0x4000_5000,
            PortId::C => 0x4000_6000,
            PortId::D => 0x4000_7000,
            PortId::E => 0x4002_4000,
            PortId::F => 0x4002_5000,
        };
        RegisterBlocks {
            port,
            sysctl: 0x400F_E000,
        }
    }
}

pub struct RawGpioPort {
    id: PortId,
    registers: *mut u32,
    sysctl: *mut u32,
    claims: LineClaims,
    // Keeps the mappings alive
    _mmaps: [MmapRaw; 2],
}

impl RawGpioPort {
    const BLOCK_LEN: usize = 4096;

    const RCGCGPIO: usize = 0x608;

    // Offset 0x3FC sets all 8 bits of the address mask
    const DATA: usize = 0x3FC;
    const DIR: usize = 0x400;
    const PUR: usize = 0x510;
    const PDR: usize = 0x514;
    const DEN: usize = 0x51C;
    const AMSEL: usize = 0x528;

    const LINE_COUNT: usize = 8;

    /// Maps the register blocks of the port from `path`.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if a block offset isn't a multiple of 4 KiB.
    /// - `GpioError::Io` if the file can't be opened or mapped.
    pub fn map(path: &str, id: PortId, blocks: RegisterBlocks) -> GpioResult<Self> {
        let block_len = Self::BLOCK_LEN as u64;
        if blocks.port % block_len != 0 || blocks.sysctl % block_len != 0 {
            return Err(GpioError::InvalidArgument);
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)?;

        let port_map = MmapOptions::new()
            .offset(blocks.port)
            .len(Self::BLOCK_LEN)
            .map_raw(&file)?;

        let sysctl_map = MmapOptions::new()
            .offset(blocks.sysctl)
            .len(Self::BLOCK_LEN)
            .map_raw(&file)?;

        debug!("{} mapped from {} at {:#x}, sysctl at {:#x}", id, path, blocks.port, blocks.sysctl);
        Ok(RawGpioPort {
            id,
            registers: port_map.as_mut_ptr() as *mut u32,
            sysctl: sysctl_map.as_mut_ptr() as *mut u32,
            claims: LineClaims::new(Self::LINE_COUNT),
            _mmaps: [port_map, sysctl_map],
        })
    }

    /// Maps the register blocks of the port through `/dev/mem`, at physical addresses.
    pub fn new_mem(id: PortId, blocks: RegisterBlocks) -> GpioResult<Self> {
        Self::map("/dev/mem", id, blocks)
    }

    fn check_mask(mask: u32) -> GpioResult<()> {
        if mask >> Self::LINE_COUNT != 0 {
            return Err(GpioError::InvalidArgument);
        }
        Ok(())
    }

    /// # Safety
    ///
    /// `base` must point to a live, writable register block of at least `offset + 4` bytes.
    unsafe fn read_register(base: *mut u32, offset: usize) -> u32 {
        unsafe { base.add(offset / 4).read_volatile() }
    }

    /// Clears then sets bits of a register.
    ///
    /// # Safety
    ///
    /// `base` must point to a live, writable register block of at least `offset + 4` bytes.
    unsafe fn modify_register(base: *mut u32, offset: usize, clear: u32, set: u32) {
        let register_ptr = unsafe { base.add(offset / 4) };
        let mut register_value = unsafe { register_ptr.read_volatile() };
        register_value &= !clear;
        register_value |= set;
        unsafe { register_ptr.write_volatile(register_value) };
    }

    fn read_port(&self, offset: usize) -> u32 {
        // The port block is mapped for the whole life of self
        unsafe { Self::read_register(self.registers, offset) }
    }

    fn modify_port(&self, offset: usize, clear: u32, set: u32) {
        unsafe { Self::modify_register(self.registers, offset, clear, set) }
    }

    fn modify_sysctl(&self, offset: usize, clear: u32, set: u32) -> u32 {
        unsafe {
            Self::modify_register(self.sysctl, offset, clear, set);
            Self::read_register(self.sysctl, offset)
        }
    }
}

impl Debug for RawGpioPort {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawGpioPort({}, {:?})", self.id, self.registers.addr())
    }
}

impl GpioPort for RawGpioPort {
    fn id(&self) -> PortId {
        self.id
    }

    fn enable_clock(&self) -> GpioResult<()> {
        // Reading back gives the clock a few cycles to come up before the port is touched
        let _ = self.modify_sysctl(Self::RCGCGPIO, 0, 1 << self.id.index());
        debug!("{} clock enabled", self.id);
        Ok(())
    }

    fn configure_output(&self, mask: u32, bias: GpioBias) -> GpioResult<()> {
        Self::check_mask(mask)?;

        self.modify_port(Self::DIR, 0, mask);
        self.modify_port(Self::DEN, 0, mask);
        self.modify_port(Self::AMSEL, mask, 0);
        match bias {
            GpioBias::None => {}
            GpioBias::PullUp => self.modify_port(Self::PUR, 0, mask),
            GpioBias::PullDown => self.modify_port(Self::PDR, 0, mask),
        }

        debug!("{} lines {:08b} configured as outputs ({:?})", self.id, mask, bias);
        Ok(())
    }

    fn set_bits(&self, mask: u32) -> GpioResult<()> {
        Self::check_mask(mask)?;
        self.modify_port(Self::DATA, 0, mask);
        Ok(())
    }

    fn clear_bits(&self, mask: u32) -> GpioResult<()> {
        Self::check_mask(mask)?;
        self.modify_port(Self::DATA, mask, 0);
        Ok(())
    }

    fn read_bits(&self) -> GpioResult<u32> {
        Ok(self.read_port(Self::DATA) & 0xFF)
    }

    fn claim(&self, mask: u32) -> GpioResult<()> {
        self.claims.claim(mask)
    }

    fn release(&self, mask: u32) {
        self.claims.release(mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    /// A file standing in for physical memory, two blocks long.
    struct FakeMemory(PathBuf);

    impl FakeMemory {
        fn new(name: &str) -> Self {
            let path = std::env::temp_dir().join(format!("charlcd-{}-{}", name, std::process::id()));
            fs::write(&path, vec![0u8; 2 * RawGpioPort::BLOCK_LEN]).unwrap();
            FakeMemory(path)
        }

        fn path(&self) -> &str {
            self.0.to_str().unwrap()
        }

        fn register(&self, block: usize, offset: usize) -> u32 {
            let bytes = fs::read(&self.0).unwrap();
            let at = block * RawGpioPort::BLOCK_LEN + offset;
            u32::from_ne_bytes(bytes[at..at + 4].try_into().unwrap())
        }
    }

    impl Drop for FakeMemory {
        fn drop(&mut self) {
            let _ = fs::remove_file(&self.0);
        }
    }

    const BLOCKS: RegisterBlocks = RegisterBlocks {
        port: 0,
        sysctl: RawGpioPort::BLOCK_LEN as u64,
    };

    #[test]
    fn tm4c123_blocks_are_page_aligned() {
        for id in [PortId::A, PortId::B, PortId::C, PortId::D, PortId::E, PortId::F] {
            let blocks = RegisterBlocks::tm4c123(id);
            assert_eq!(blocks.port % RawGpioPort::BLOCK_LEN as u64, 0);
            assert_eq!(blocks.sysctl % RawGpioPort::BLOCK_LEN as u64, 0);
        }
        assert_eq!(RegisterBlocks::tm4c123(PortId::D).port, 0x4000_7000);
    }

    #[test]
    fn registers_are_modified_in_place() {
        // A fake register block in ordinary memory
        let mut block = vec![0u32; RawGpioPort::BLOCK_LEN / 4];
        let base = block.as_mut_ptr();

        let value = unsafe {
            RawGpioPort::modify_register(base, RawGpioPort::DATA, 0, 0b1011);
            RawGpioPort::modify_register(base, RawGpioPort::DATA, 0b0010, 0b0100);
            RawGpioPort::read_register(base, RawGpioPort::DATA)
        };
        assert_eq!(value, 0b1101);
        assert_eq!(block[RawGpioPort::DATA / 4], 0b1101);
    }

    #[test]
    fn unaligned_blocks_are_refused() {
        let memory = FakeMemory::new("unaligned");
        let blocks = RegisterBlocks { port: 0x10, sysctl: 0 };

        assert_eq!(
            RawGpioPort::map(memory.path(), PortId::A, blocks).unwrap_err(),
            GpioError::InvalidArgument,
        );
    }

    #[test]
    fn port_drives_the_mapped_blocks() {
        let memory = FakeMemory::new("mapped");
        {
            let port = RawGpioPort::map(memory.path(), PortId::C, BLOCKS).unwrap();

            port.enable_clock().unwrap();
            port.configure_output(0b0000_1111, GpioBias::PullDown).unwrap();
            port.set_bits(0b0000_0101).unwrap();
            port.clear_bits(0b0000_0100).unwrap();
            assert_eq!(port.read_bits().unwrap(), 0b0000_0001);
            assert_eq!(port.set_bits(1 << 8), Err(GpioError::InvalidArgument));
        }

        assert_eq!(memory.register(1, RawGpioPort::RCGCGPIO), 1 << 2);
        assert_eq!(memory.register(0, RawGpioPort::DIR), 0b0000_1111);
        assert_eq!(memory.register(0, RawGpioPort::DEN), 0b0000_1111);
        assert_eq!(memory.register(0, RawGpioPort::PDR), 0b0000_1111);
        assert_eq!(memory.register(0, RawGpioPort::PUR), 0);
        assert_eq!(memory.register(0, RawGpioPort::DATA), 0b0000_0001);
    }
}
