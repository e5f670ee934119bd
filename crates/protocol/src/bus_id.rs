//! 29-bit extended identifier layout for the multi-drop bus.
//!
//! Every frame's identifier encodes who is talking, to whom, and what
//! command the payload belongs to. Bit layout, low to high:
//!
//! ```text
//! [0]      command_type       0 = request, 1 = response
//! [1..9]   opcode             command byte
//! [9..13]  destination board  4 bits
//! [13..17] destination node   4 bits
//! [17..21] source board       4 bits
//! [21..25] source node        4 bits
//! [25..27] broadcast scope    0 none, 1 board, 2 global, 3 reserved
//! [27..29] priority           0 highest .. 3 lowest
//! ```
//!
//! Packing and unpacking are exact inverses over every field's bit width,
//! which the hardware acceptance filters rely on.

// ---------------------------------------------------------------------------
// Field positions and widths
// ---------------------------------------------------------------------------

const TYPE_SHIFT: u32 = 0;
const TYPE_MASK: u32 = 0x1;
const OPCODE_SHIFT: u32 = 1;
const OPCODE_MASK: u32 = 0xFF;
const DEST_BOARD_SHIFT: u32 = 9;
const DEST_NODE_SHIFT: u32 = 13;
const SRC_BOARD_SHIFT: u32 = 17;
const SRC_NODE_SHIFT: u32 = 21;
const ADDR_MASK: u32 = 0xF;
const SCOPE_SHIFT: u32 = 25;
const SCOPE_MASK: u32 = 0x3;
const PRIORITY_SHIFT: u32 = 27;
const PRIORITY_MASK: u32 = 0x3;

/// Mask covering all 29 identifier bits.
pub const ID_MASK: u32 = 0x1FFF_FFFF;

// ---------------------------------------------------------------------------
// Field types
// ---------------------------------------------------------------------------

/// Direction of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandType {
    /// Remote-originated command.
    Request,
    /// Device-originated reply.
    Response,
}

impl CommandType {
    fn from_bit(bit: u32) -> Self {
        if bit == 0 {
            Self::Request
        } else {
            Self::Response
        }
    }

    fn to_bit(self) -> u32 {
        match self {
            Self::Request => 0,
            Self::Response => 1,
        }
    }
}

/// Addressing scope of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BroadcastScope {
    /// Exactly one (board, node) pair.
    None,
    /// Every node on the destination board.
    Board,
    /// Every board on the bus.
    Global,
    /// Unassigned scope bits; carried verbatim so unpack stays total.
    Reserved,
}

impl BroadcastScope {
    fn from_bits(bits: u32) -> Self {
        match bits {
            0 => Self::None,
            1 => Self::Board,
            2 => Self::Global,
            _ => Self::Reserved,
        }
    }

    fn to_bits(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Board => 1,
            Self::Global => 2,
            Self::Reserved => 3,
        }
    }
}

/// Frame priority; the bus arbitrates lower identifier bits first, so 0 wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Priority {
    /// Alarms, faults, and all bootloader replies.
    VeryHigh,
    /// Control commands.
    High,
    /// Default traffic.
    Medium,
    /// Data collection and monitoring.
    Low,
}

impl Priority {
    fn from_bits(bits: u32) -> Self {
        match bits {
            0 => Self::VeryHigh,
            1 => Self::High,
            2 => Self::Medium,
            _ => Self::Low,
        }
    }

    fn to_bits(self) -> u32 {
        match self {
            Self::VeryHigh => 0,
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
        }
    }
}

/// A (board, node) bus address. Both fields are 4-bit; value 0 doubles as the
/// broadcast id within the matching scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NodeAddress {
    /// Board id, 4 bits.
    pub board: u8,
    /// Node id within the board, 4 bits.
    pub node: u8,
}

impl NodeAddress {
    /// Construct an address; ids are masked to their 4-bit width.
    #[must_use]
    pub fn new(board: u8, node: u8) -> Self {
        Self {
            board: board & ADDR_MASK as u8,
            node: node & ADDR_MASK as u8,
        }
    }
}

// ---------------------------------------------------------------------------
// BusId
// ---------------------------------------------------------------------------

/// The unpacked form of a 29-bit frame identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusId {
    /// Request or response.
    pub command_type: CommandType,
    /// Command opcode carried in the identifier, not the payload.
    pub opcode: u8,
    /// Who the frame is for.
    pub destination: NodeAddress,
    /// Who sent the frame.
    pub source: NodeAddress,
    /// Broadcast scope modifier on the destination.
    pub scope: BroadcastScope,
    /// Arbitration priority.
    pub priority: Priority,
}

impl BusId {
    /// Pack the fields into a 29-bit identifier.
    #[must_use]
    pub fn pack(&self) -> u32 {
        (self.command_type.to_bit() << TYPE_SHIFT)
            | ((u32::from(self.opcode) & OPCODE_MASK) << OPCODE_SHIFT)
            | ((u32::from(self.destination.board) & ADDR_MASK) << DEST_BOARD_SHIFT)
            | ((u32::from(self.destination.node) & ADDR_MASK) << DEST_NODE_SHIFT)
            | ((u32::from(self.source.board) & ADDR_MASK) << SRC_BOARD_SHIFT)
            | ((u32::from(self.source.node) & ADDR_MASK) << SRC_NODE_SHIFT)
            | (self.scope.to_bits() << SCOPE_SHIFT)
            | (self.priority.to_bits() << PRIORITY_SHIFT)
    }

    /// Unpack a received identifier. Total over all 29-bit values; bits above
    /// the identifier width are ignored.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // fields are masked to <= 8 bits before the cast
    pub fn unpack(raw: u32) -> Self {
        Self {
            command_type: CommandType::from_bit((raw >> TYPE_SHIFT) & TYPE_MASK),
            opcode: ((raw >> OPCODE_SHIFT) & OPCODE_MASK) as u8,
            destination: NodeAddress {
                board: ((raw >> DEST_BOARD_SHIFT) & ADDR_MASK) as u8,
                node: ((raw >> DEST_NODE_SHIFT) & ADDR_MASK) as u8,
            },
            source: NodeAddress {
                board: ((raw >> SRC_BOARD_SHIFT) & ADDR_MASK) as u8,
                node: ((raw >> SRC_NODE_SHIFT) & ADDR_MASK) as u8,
            },
            scope: BroadcastScope::from_bits((raw >> SCOPE_SHIFT) & SCOPE_MASK),
            priority: Priority::from_bits((raw >> PRIORITY_SHIFT) & PRIORITY_MASK),
        }
    }

    /// Identifier for a reply to `request`: response type, destination set to
    /// the requester, our own identity as source, no broadcast, priority 0.
    #[must_use]
    pub fn reply_to(request: &BusId, own: NodeAddress, opcode: u8) -> Self {
        Self {
            command_type: CommandType::Response,
            opcode,
            destination: request.source,
            source: own,
            scope: BroadcastScope::None,
            priority: Priority::VeryHigh,
        }
    }
}

// ---------------------------------------------------------------------------
// Acceptance filters
// ---------------------------------------------------------------------------

/// One id/mask pair for the controller's hardware acceptance filters.
/// A frame is admitted when `frame_id & mask == id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AcceptanceFilter {
    /// Expected bits.
    pub id: u32,
    /// Which bits participate in the comparison.
    pub mask: u32,
}

impl AcceptanceFilter {
    /// Whether `raw` passes this filter.
    #[must_use]
    pub fn admits(&self, raw: u32) -> bool {
        raw & self.mask == self.id
    }
}

/// The three filters a device installs: unicast to (board, node), board-wide
/// broadcast to its board, and global broadcast. All match requests only.
#[must_use]
pub fn acceptance_filters(own: NodeAddress) -> [AcceptanceFilter; 3] {
    let request = CommandType::Request.to_bit() << TYPE_SHIFT;
    [
        // (this board, this node), no broadcast
        AcceptanceFilter {
            id: request
                | ((u32::from(own.board) & ADDR_MASK) << DEST_BOARD_SHIFT)
                | ((u32::from(own.node) & ADDR_MASK) << DEST_NODE_SHIFT)
                | (BroadcastScope::None.to_bits() << SCOPE_SHIFT),
            mask: (TYPE_MASK << TYPE_SHIFT)
                | (ADDR_MASK << DEST_BOARD_SHIFT)
                | (ADDR_MASK << DEST_NODE_SHIFT)
                | (SCOPE_MASK << SCOPE_SHIFT),
        },
        // (this board, any node), board broadcast
        AcceptanceFilter {
            id: request
                | ((u32::from(own.board) & ADDR_MASK) << DEST_BOARD_SHIFT)
                | (BroadcastScope::Board.to_bits() << SCOPE_SHIFT),
            mask: (TYPE_MASK << TYPE_SHIFT)
                | (ADDR_MASK << DEST_BOARD_SHIFT)
                | (SCOPE_MASK << SCOPE_SHIFT),
        },
        // any board, global broadcast
        AcceptanceFilter {
            id: request | (BroadcastScope::Global.to_bits() << SCOPE_SHIFT),
            mask: (TYPE_MASK << TYPE_SHIFT) | (SCOPE_MASK << SCOPE_SHIFT),
        },
    ]
}
