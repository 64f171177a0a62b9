// Copyright 2024 PRAGMA
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use stackpool_kernel::{Address, Ustx};

/// Pool operator whose distributions left the remainder behind.
pub type Key = Address;

/// Cumulative truncation remainder of a pool's distributions. Dust never leaves the operator's
/// reserve; this only accounts for it.
pub type Row = Ustx;
