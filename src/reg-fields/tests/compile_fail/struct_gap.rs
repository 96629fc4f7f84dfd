// Copyright 2022 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![allow(dead_code)]

reg_fields::register!(Word, 2, { VALUE: 0..16 });

reg_fields::register_struct!(Gapped, { low: Word @ 0, high: Word @ 4 });

fn main() {}
