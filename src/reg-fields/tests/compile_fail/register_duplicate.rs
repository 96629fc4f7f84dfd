// Copyright 2022 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

reg_fields::register!(
    Duplicate, 1, {
        LME: 0,
        lme: 1,
    }
);

fn main() {}
