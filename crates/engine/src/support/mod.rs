// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Resource allocation shared by the services.

pub mod port;
pub mod scratch;
