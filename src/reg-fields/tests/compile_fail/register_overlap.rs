// Copyright 2022 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

reg_fields::register!(
    Overlap, 1, {
        A: 0..4,
        B: 3..5,
    }
);

fn main() {}
