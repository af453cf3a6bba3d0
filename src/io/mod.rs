// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! I/O operations: image sources, persistence, sidecars and export.

pub mod export;
pub mod media;
pub mod persistence;
pub mod serialization;
