// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Hardware abstraction shims for the event-polling workspace.
#![cfg_attr(not(feature = "std"), no_std)]

pub mod time;
