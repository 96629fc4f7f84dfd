// Copyright 2022 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Sample x86 registers declared with [`crate::register!`] and [`crate::register_struct!`].

reg_fields::register!(
    /// Extended feature enables (MSR `0xC000_0080`).
    Ia32Efer, 8, {
        /// System call extensions
        SCE: 0,
        RESERVED0: 1..8,
        /// Long mode enable
        LME: 8,
        RESERVED1: 9..10,
        /// Long mode active
        #[read_only]
        LMA: 10,
        /// No-execute enable
        NXE: 11,
        RESERVED2: 12..64,
    }
);

reg_fields::register!(
    /// VM-entry interruption-information field of the VMCS.
    VmEntryInterruptionInfo, 4, {
        /// Vector of interrupt or exception
        VECTOR: 0..8,
        /// Interruption type
        #[enumerated(
            EXTERNAL = 0,
            NMI = 2,
            HARDWARE_EXCEPTION = 3,
            SOFTWARE_INTERRUPT = 4,
            PRIVILEGED_SOFTWARE_EXCEPTION = 5,
            SOFTWARE_EXCEPTION = 6,
            OTHER = 7
        )]
        TYPE: 8..11,
        /// Deliver error code
        DELIVER_ERROR_CODE: 11,
        RESERVED: 12..31,
        /// Valid
        VALID: 31,
    }
);

reg_fields::register!(
    /// Page-directory base register, without PCIDs.
    Cr3, 8, {
        RESERVED0: 0..3,
        /// Page-level write-through
        PWT: 3,
        /// Page-level cache disable
        PCD: 4,
        RESERVED1: 5..12,
        /// Physical address of the page directory
        #[hex]
        ADDRESS: 12..=51,
        RESERVED2: 52..64,
    }
);

reg_fields::register!(
    /// Limit of the global descriptor table.
    GdtLimit, 2, {
        /// Size of the table in bytes, minus one
        LIMIT: 0..16,
    }
);

reg_fields::register!(
    /// Linear base address of the global descriptor table.
    GdtBase, 8, {
        /// Base address
        #[hex]
        BASE: 0..64,
    }
);

reg_fields::register_struct!(
    /// Global descriptor table register, as stored by `SGDT`.
    Gdtr, {
        /// Table limit
        limit: GdtLimit @ 0,
        /// Table base
        base: GdtBase @ 2,
    }
);
