use super::BlockCursor;

use crate::structs::BLOCK_SIZE;

impl BlockCursor {
    pub fn new(position: usize) -> Self {
        let mut cursor = Self {
            block_size: BLOCK_SIZE,
            current_block: 0,
            current_byte: 0,
        };
        cursor.set(position);
        cursor
    }

    pub fn advance(&mut self, bytes: usize) -> usize {
        let remaining_bytes = self.block_size - self.current_byte;
        if bytes < remaining_bytes {
            self.current_byte += bytes;
            return self.position();
        }
        let bytes = bytes - remaining_bytes;
        self.current_block += bytes / self.block_size + 1;
        self.current_byte = bytes % self.block_size;
        self.position()
    }

    pub fn set(&mut self, position: usize) -> usize {
        self.reset();
        self.advance(position)
    }

    pub fn reset(&mut self) {
        self.current_block = 0;
        self.current_byte = 0;
    }

    /// Direct slot holding the current byte
    pub fn block(&self) -> usize {
        self.current_block
    }

    /// Offset of the current byte inside its block
    pub fn byte(&self) -> usize {
        self.current_byte
    }

    pub fn position(&self) -> usize {
        self.current_block * self.block_size + self.current_byte
    }
}

#[cfg(test)]
mod tests {
    use super::BlockCursor;

    #[test]
    fn advance_without_overflow() {
        let mut cursor = BlockCursor::new(0);
        assert_eq!(cursor.current_block, 0);
        assert_eq!(cursor.current_byte, 0);
        cursor.advance(400);
        assert_eq!(cursor.current_block, 0);
        assert_eq!(cursor.current_byte, 400);
        cursor.advance(623);
        assert_eq!(cursor.current_block, 0);
        assert_eq!(cursor.current_byte, 1023);
    }

    #[test]
    fn advance_with_overflow() {
        let mut cursor = BlockCursor::new(0);
        cursor.advance(1100);
        assert_eq!(cursor.current_block, 1);
        assert_eq!(cursor.current_byte, 76);
        cursor.advance(2000);
        assert_eq!(cursor.current_block, 3);
        assert_eq!(cursor.current_byte, 28);
        assert_eq!(cursor.position(), 3100);
    }

    #[test]
    fn lands_on_block_boundary() {
        let mut cursor = BlockCursor::new(1024);
        assert_eq!(cursor.block(), 1);
        assert_eq!(cursor.byte(), 0);
        cursor.advance(1024);
        assert_eq!(cursor.block(), 2);
        assert_eq!(cursor.byte(), 0);
    }

    #[test]
    fn set_restarts_from_zero() {
        let mut cursor = BlockCursor::new(5000);
        assert_eq!(cursor.set(10), 10);
        assert_eq!(cursor.block(), 0);
    }
}
