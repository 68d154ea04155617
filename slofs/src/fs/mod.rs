// SPDX-License-Identifier: MIT

pub mod slofs;
