use crate::cpu::flag::{Flags, FLAG_CF, FLAG_SF, FLAG_ZF};

#[test]
fn carry_tracks_the_bit_above_the_result_width() {
    let mut f = Flags::new();
    f.set_carry_u8(0x100);
    assert_eq!(true, f.carry);
    f.set_carry_u8(0xFF);
    assert_eq!(false, f.carry);

    f.set_carry_u16(0x1_0000);
    assert_eq!(true, f.carry);
    f.set_carry_u16(0xFFFF);
    assert_eq!(false, f.carry);

    // a wrapped subtraction shows its borrow in the carry bit
    let borrowed = 10usize.wrapping_sub(20);
    f.set_carry_u16(borrowed);
    assert_eq!(true, f.carry);
}

#[test]
fn zero_and_sign_follow_the_masked_result() {
    let mut f = Flags::new();
    f.set_zero_u8(0x100);
    assert_eq!(true, f.zero);
    f.set_zero_u16(0x100);
    assert_eq!(false, f.zero);

    f.set_sign_u8(0x80);
    assert_eq!(true, f.sign);
    f.set_sign_u16(0x8000);
    assert_eq!(true, f.sign);
    f.set_sign_u16(0x7FFF);
    assert_eq!(false, f.sign);
}

#[test]
fn signed_overflow_on_addition() {
    let mut f = Flags::new();
    // 0x7F + 1 overflows an i8
    f.set_overflow_add_u8(0x80, 0x7F, 0x01);
    assert_eq!(true, f.overflow);
    // 1 + 1 does not
    f.set_overflow_add_u8(0x02, 0x01, 0x01);
    assert_eq!(false, f.overflow);
}

#[test]
fn signed_overflow_on_subtraction() {
    let mut f = Flags::new();
    // 0x8000 - 1 overflows an i16
    let res = 0x8000usize.wrapping_sub(1);
    f.set_overflow_sub_u16(res, 1, 0x8000);
    assert_eq!(true, f.overflow);
    // 10 - 20 does not
    let res = 10usize.wrapping_sub(20);
    f.set_overflow_sub_u16(res, 20, 10);
    assert_eq!(false, f.overflow);
}

#[test]
fn packs_and_unpacks_the_flags_word() {
    let mut f = Flags::new();
    f.carry = true;
    f.zero = true;
    f.sign = true;
    let packed = f.u16();
    assert_eq!(FLAG_CF | FLAG_ZF | FLAG_SF, packed);

    let mut g = Flags::new();
    g.set_u16(packed);
    assert_eq!(f, g);
}
