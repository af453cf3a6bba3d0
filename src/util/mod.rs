// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Coordinate, geometry and colour helpers.

pub mod geometry;
pub mod palette;
pub mod viewport;
