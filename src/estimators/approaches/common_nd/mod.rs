// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

// Point-set utilities shared by the neighbour search backends and the MI estimators

pub mod dataset;
