// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

pub mod access_key;
pub mod archive;
pub mod classifier;
pub mod engine;
pub mod fallback;
pub mod logging;
pub mod orchestrator;
pub mod payload;
