/// Engine configuration builder.
///
/// ```
/// use postro_wire::Config;
///
/// let config = Config::new().value_batch(4096).max_message_len(64 * 1024 * 1024);
/// assert_eq!(config.get_value_batch(), 4096);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) value_batch: usize,
    pub(crate) field_batch: usize,
    pub(crate) max_message_len: usize,
}

impl Config {
    /// Default amount of [`DataRow`][crate::message::DataRow] value slots allocated at once.
    pub const VALUE_BATCH: usize = 1024;

    /// Default amount of [`RowDescription`][crate::message::RowDescription] field slots allocated at once.
    pub const FIELD_BATCH: usize = 64;

    /// Largest body accepted by default, postgres `MaxAllocSize`.
    pub const MAX_MESSAGE_LEN: usize = 0x3fff_ffff;

    pub fn new() -> Config {
        Self {
            value_batch: Self::VALUE_BATCH,
            field_batch: Self::FIELD_BATCH,
            max_message_len: Self::MAX_MESSAGE_LEN,
        }
    }

    /// Set the amount of value slots allocated at once.
    ///
    /// Rows wider than this still get a dedicated allocation.
    pub fn value_batch(mut self, value: usize) -> Self {
        self.value_batch = value;
        self
    }

    /// Set the amount of field description slots allocated at once.
    pub fn field_batch(mut self, value: usize) -> Self {
        self.field_batch = value;
        self
    }

    /// Set the largest message body accepted, larger declared length is a protocol error.
    pub fn max_message_len(mut self, value: usize) -> Self {
        self.max_message_len = value;
        self
    }

    pub fn get_value_batch(&self) -> usize {
        self.value_batch
    }

    pub fn get_field_batch(&self) -> usize {
        self.field_batch
    }

    pub fn get_max_message_len(&self) -> usize {
        self.max_message_len
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
