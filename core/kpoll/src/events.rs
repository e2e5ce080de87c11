// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

use bitflags::bitflags;

bitflags! {
    /// I/O readiness conditions, numerically compatible with the Linux
    /// `EPOLL*` / `POLL*` event bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct IoEvents: u32 {
        /// Data available for reading.
        const IN = 0x0001;
        /// Urgent data available.
        const PRI = 0x0002;
        /// Writing will not block.
        const OUT = 0x0004;
        /// Error condition.
        const ERR = 0x0008;
        /// Peer hung up.
        const HUP = 0x0010;
        /// Peer closed its writing half.
        const RDHUP = 0x2000;
    }
}

impl IoEvents {
    /// Conditions delivered regardless of the subscriber's interest mask.
    pub const ALWAYS: Self = Self::ERR.union(Self::HUP);
}
