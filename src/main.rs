// SPDX-License-Identifier: MIT

fn main() {
    ironform::run();
}
