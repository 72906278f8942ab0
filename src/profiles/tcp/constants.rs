//! Constants specific to the TCP/IP compression profile (RFC 6846).

// --- Packet type octets and discriminators (RFC 6846 Section 7.3.2) ---

/// IR packet type octet.
pub const PACKET_TYPE_IR: u8 = 0xFD;
/// IR-DYN packet type octet.
pub const PACKET_TYPE_IR_DYN: u8 = 0xF8;

/// co_common discriminator, 7 bits `1111101`.
pub const DISC_CO_COMMON: u8 = 0x7D;
/// rnd_1 discriminator, 6 bits `101110`.
pub const DISC_RND_1: u8 = 0x2E;
/// rnd_2 discriminator, 4 bits `1100`.
pub const DISC_RND_2: u8 = 0x0C;
/// rnd_3 discriminator, 1 bit `0`.
pub const DISC_RND_3: u8 = 0x00;
/// rnd_4 discriminator, 4 bits `1101`.
pub const DISC_RND_4: u8 = 0x0D;
/// rnd_5 discriminator, 3 bits `100`.
pub const DISC_RND_5: u8 = 0x04;
/// rnd_6 discriminator, 4 bits `1010`.
pub const DISC_RND_6: u8 = 0x0A;
/// rnd_7 discriminator, 6 bits `101111`.
pub const DISC_RND_7: u8 = 0x2F;
/// rnd_8 discriminator, 5 bits `10110`.
pub const DISC_RND_8: u8 = 0x16;
/// seq_1 discriminator, 4 bits `1010`.
pub const DISC_SEQ_1: u8 = 0x0A;
/// seq_2 discriminator, 5 bits `11010`.
pub const DISC_SEQ_2: u8 = 0x1A;
/// seq_3 discriminator, 4 bits `1001`.
pub const DISC_SEQ_3: u8 = 0x09;
/// seq_4 discriminator, 1 bit `0`.
pub const DISC_SEQ_4: u8 = 0x00;
/// seq_5 discriminator, 4 bits `1000`.
pub const DISC_SEQ_5: u8 = 0x08;
/// seq_6 discriminator, 5 bits `11011`.
pub const DISC_SEQ_6: u8 = 0x1B;
/// seq_7 discriminator, 4 bits `1100`.
pub const DISC_SEQ_7: u8 = 0x0C;
/// seq_8 discriminator, 4 bits `1011`.
pub const DISC_SEQ_8: u8 = 0x0B;

// --- IP-ID behavior wire values (RFC 6846 Section 6.3.3) ---

/// IP-ID increments by one per packet.
pub const IP_ID_BEHAVIOR_SEQUENTIAL: u8 = 0;
/// IP-ID increments by one per packet when viewed byte-swapped.
pub const IP_ID_BEHAVIOR_SEQUENTIAL_SWAPPED: u8 = 1;
/// IP-ID carries no exploitable pattern.
pub const IP_ID_BEHAVIOR_RANDOM: u8 = 2;
/// IP-ID is constant zero.
pub const IP_ID_BEHAVIOR_ZERO: u8 = 3;

// --- MSN LSB parameters, common to every CO format ---

/// Number of MSN LSBs carried by CO base headers.
pub const MSN_LSB_WIDTH: u8 = 4;
/// Interpretation offset for the MSN LSBs.
pub const MSN_LSB_OFFSET: i64 = 4;

// --- TCP option interning table (RFC 6846 Section 6.3.4) ---

/// Number of slots in the option table; selects 8-bit XI items.
pub const MAX_TCP_OPTION_INDEX: usize = 16;
/// Reserved slot for NOP.
pub const TCP_INDEX_NOP: u8 = 0;
/// Reserved slot for EOL.
pub const TCP_INDEX_EOL: u8 = 1;
/// Reserved slot for MSS.
pub const TCP_INDEX_MAXSEG: u8 = 2;
/// Reserved slot for Window Scale.
pub const TCP_INDEX_WINDOW: u8 = 3;
/// Reserved slot for Timestamp.
pub const TCP_INDEX_TIMESTAMP: u8 = 4;
/// Reserved slot for SACK-Permitted.
pub const TCP_INDEX_SACK_PERMITTED: u8 = 5;
/// Reserved slot for SACK.
pub const TCP_INDEX_SACK: u8 = 6;
/// First slot available for interned generic option kinds.
pub const TCP_INDEX_FIRST_DYNAMIC: u8 = 7;
/// Marker for a free slot.
pub const TCP_INDEX_FREE_KIND: u8 = 0xFF;

/// Size of the bump arena caching generic option values.
pub const TCP_OPTIONS_ARENA_SIZE: usize = 128;

/// Consecutive equal ACK deltas required to establish `ack_stride`.
pub const ACK_STRIDE_ESTABLISHMENT_THRESHOLD: u32 = 3;
/// Smallest ACK delta worth establishing as a stride; unit deltas are
/// already covered by the plain LSB formats.
pub const ACK_STRIDE_MIN: u32 = 2;

/// XI item flag marking that a compressed value item follows the list.
pub const XI_VALUE_PRESENT: u8 = 0x80;
/// List header flag selecting 8-bit XI items.
pub const LIST_PS_8BIT: u8 = 0x10;
