// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Filter primitives: circular delay line, FIR convolution, window-based
//! coefficient design and biquad IIR sections.

pub mod biquad;
pub mod delay_line;
pub mod design;
pub mod fir;
