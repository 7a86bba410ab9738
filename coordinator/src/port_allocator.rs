use crate::error::CoordinatorError;

/// Hands out `base_port + k` for k = 0, 1, 2, ... Offsets are never reused,
/// even after the node holding one is evicted or re-registers.
#[derive(Debug)]
pub struct PortAllocator {
    base_port: u16,
    next_offset: u32,
}

impl PortAllocator {
    pub fn new(base_port: u16) -> Self {
        Self {
            base_port,
            next_offset: 0,
        }
    }

    pub fn allocate(&mut self) -> Result<u16, CoordinatorError> {
        let port = self
            .peek()
            .ok_or(CoordinatorError::PortsExhausted {
                base_port: self.base_port,
                allocated: self.next_offset,
            })?;
        self.next_offset += 1;
        Ok(port)
    }

    /// The port the next `allocate` call would return.
    pub fn peek(&self) -> Option<u16> {
        u16::try_from(u32::from(self.base_port) + self.next_offset).ok()
    }

    pub fn allocated(&self) -> u32 {
        self.next_offset
    }
}
