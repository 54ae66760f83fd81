use std::{collections::HashMap, fmt, sync::Arc};

/// The register block addressed by an SWD request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortType {
    DebugPort,
    AccessPort,
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortType::DebugPort => f.write_str("DP"),
            PortType::AccessPort => f.write_str("AP"),
        }
    }
}

/// A register access queued for later execution.
///
/// Returned inside [`SwdBatchError`](super::SwdBatchError) to indicate which queued
/// operation actually encountered the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwdCommand {
    Read { port: PortType, address: u8 },
    Write { port: PortType, address: u8, value: u32 },
}

impl SwdCommand {
    pub fn port(&self) -> PortType {
        match *self {
            SwdCommand::Read { port, .. } | SwdCommand::Write { port, .. } => port,
        }
    }

    pub fn address(&self) -> u8 {
        match *self {
            SwdCommand::Read { address, .. } | SwdCommand::Write { address, .. } => address,
        }
    }

    pub fn is_read(&self) -> bool {
        matches!(self, SwdCommand::Read { .. })
    }

    /// The 8-bit request header, to be sent LSB first.
    ///
    /// Start, APnDP, RnW, A[2:3], parity, stop and park.
    pub fn request(&self) -> u8 {
        let mut request = 0b1000_0001;

        if self.port() == PortType::AccessPort {
            request |= 0b0000_0010;
        }
        if self.is_read() {
            request |= 0b0000_0100;
        }
        request |= (self.address() & 0x0c) << 1;

        if (request >> 1 & 0x0f).count_ones() % 2 == 1 {
            request |= 0b0010_0000;
        }

        request
    }
}

impl fmt::Display for SwdCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            SwdCommand::Read { port, address } => {
                write!(f, "Read(port={port}, addr={address:#x})")
            }
            SwdCommand::Write {
                port,
                address,
                value,
            } => write!(
                f,
                "Write(port={port}, addr={address:#x}, data=0x{value:08x})"
            ),
        }
    }
}

/// The set of results returned by flushing the queue.
pub struct DeferredResultSet<T>(HashMap<DeferredResultIndex, T>);

impl<T: fmt::Debug> fmt::Debug for DeferredResultSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DeferredResultSet").field(&self.0).finish()
    }
}

impl<T> Default for DeferredResultSet<T> {
    fn default() -> Self {
        Self(HashMap::default())
    }
}

impl<T> DeferredResultSet<T> {
    /// Creates a new empty result set.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, idx: &DeferredResultIndex, result: T) {
        self.0.insert(idx.clone(), result);
    }

    /// Returns the number of results in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Takes a result from the set.
    pub fn take(&mut self, index: DeferredResultIndex) -> Result<T, DeferredResultIndex> {
        self.0.remove(&index).ok_or(index)
    }
}

/// An index type used to retrieve the result of a queued read.
///
/// This type can detect if the result of a command is not used.
#[derive(Eq)]
pub struct DeferredResultIndex(Arc<()>);

impl PartialEq for DeferredResultIndex {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for DeferredResultIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DeferredResultIndex")
            .field(&self.id())
            .finish()
    }
}

impl DeferredResultIndex {
    // Intentionally private. User code must not be able to create these.
    fn new() -> Self {
        Self(Arc::new(()))
    }

    fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    pub(crate) fn should_capture(&self) -> bool {
        // The queue holds one reference. A second one exists only while the caller still
        // holds the index returned when the read was queued.
        Arc::strong_count(&self.0) > 1
    }

    // Intentionally private. User code must not be able to clone these.
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl std::hash::Hash for DeferredResultIndex {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id().hash(state)
    }
}

/// The phase of the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueueState {
    /// Operations are accepted, nothing is executed.
    #[default]
    Building,
    /// The queued operations are being executed.
    Flushing,
}

/// Register accesses waiting to be flushed, in FIFO order.
#[derive(Debug, Default)]
pub struct SwdQueue {
    commands: Vec<(DeferredResultIndex, SwdCommand)>,
    state: QueueState,
}

impl SwdQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules a command for later execution.
    ///
    /// Returns a token value that can be used to retrieve the result of the command.
    pub fn schedule(&mut self, command: SwdCommand) -> DeferredResultIndex {
        let index = DeferredResultIndex::new();
        self.commands.push((index.clone(), command));
        index
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn state(&self) -> QueueState {
        self.state
    }

    pub fn iter(&self) -> impl Iterator<Item = &SwdCommand> {
        self.commands.iter().map(|(_, command)| command)
    }

    /// Switches to [`QueueState::Flushing`] and hands out all queued commands.
    pub(crate) fn begin_flush(&mut self) -> Vec<(DeferredResultIndex, SwdCommand)> {
        self.state = QueueState::Flushing;
        std::mem::take(&mut self.commands)
    }

    pub(crate) fn end_flush(&mut self) {
        self.state = QueueState::Building;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(PortType::DebugPort, true, 0x0 => 0xa5; "read DP IDCODE")]
    #[test_case(PortType::DebugPort, false, 0x0 => 0x81; "write DP ABORT")]
    #[test_case(PortType::DebugPort, false, 0x8 => 0xb1; "write DP SELECT")]
    #[test_case(PortType::DebugPort, true, 0xc => 0xbd; "read DP RDBUFF")]
    #[test_case(PortType::AccessPort, true, 0xc => 0x9f; "read AP register 0xc")]
    #[test_case(PortType::AccessPort, false, 0x4 => 0x8b; "write AP register 0x4")]
    fn request_header(port: PortType, read: bool, address: u8) -> u8 {
        let command = if read {
            SwdCommand::Read { port, address }
        } else {
            SwdCommand::Write {
                port,
                address,
                value: 0,
            }
        };

        command.request()
    }

    #[test]
    fn dropped_index_is_not_captured() {
        let mut queue = SwdQueue::new();
        let kept = queue.schedule(SwdCommand::Read {
            port: PortType::DebugPort,
            address: 0,
        });
        drop(queue.schedule(SwdCommand::Read {
            port: PortType::DebugPort,
            address: 4,
        }));

        let commands = queue.begin_flush();
        let captured: Vec<_> = commands
            .iter()
            .map(|(index, _)| index.should_capture())
            .collect();

        pretty_assertions::assert_eq!(captured, vec![true, false]);
        pretty_assertions::assert_eq!(queue.state(), QueueState::Flushing);
        assert!(queue.is_empty());
        drop(kept);
    }

    #[test]
    fn display_names_the_operation() {
        let command = SwdCommand::Write {
            port: PortType::AccessPort,
            address: 0x4,
            value: 0x2000_0000,
        };

        pretty_assertions::assert_eq!(
            command.to_string(),
            "Write(port=AP, addr=0x4, data=0x20000000)"
        );
    }
}
