// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test harness for contact shield attack simulation.
//!
//! Attacks run against the shield and validator on a simulated clock so
//! that window and block durations can be crossed without sleeping.

pub mod attacks;
pub mod generators;
pub mod metrics;
